use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Which search operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Vector,
    FullText,
    Hybrid,
}

impl std::fmt::Display for SearchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchKind::Vector => write!(f, "vector"),
            SearchKind::FullText => write!(f, "full-text"),
            SearchKind::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Error reported by a backend collaborator (client, database, container)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Invalid configuration for entity '{entity}'{}: {message}", field_suffix(.field))]
    Configuration {
        entity: String,
        field: Option<String>,
        message: String,
    },

    #[error("Invalid schema for entity '{entity}': {message}")]
    Schema { entity: String, message: String },

    #[error("Unable to connect after {attempts} attempt(s): {message}")]
    Connection { attempts: u32, message: String },

    #[error("Item not found: {id}")]
    NotFound { id: String },

    #[error("{operation} failed: {source}")]
    Backend {
        operation: String,
        #[source]
        source: BackendError,
    },

    #[error("{kind} search failed: {message}")]
    Search { kind: SearchKind, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(field) => format!(" (field '{}')", field),
        None => String::new(),
    }
}

impl Error {
    pub fn configuration(entity: impl Into<String>, field: Option<&str>, message: impl Into<String>) -> Self {
        Error::Configuration {
            entity: entity.into(),
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn backend(operation: impl Into<String>, source: BackendError) -> Self {
        Error::Backend {
            operation: operation.into(),
            source,
        }
    }

    /// True when the error is a not-found outcome, either raised directly or
    /// reported by the backend.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Backend { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = Error::configuration("Contact", Some("email"), "empty unique key");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for entity 'Contact' (field 'email'): empty unique key"
        );

        let err = Error::Connection { attempts: 9, message: "refused".into() };
        assert!(err.to_string().contains("9 attempt(s)"));

        let err = Error::Search { kind: SearchKind::Vector, message: "Database error".into() };
        assert_eq!(err.to_string(), "vector search failed: Database error");
    }

    #[test]
    fn test_not_found_detection() {
        let err = Error::backend("read", BackendError::NotFound("c1".into()));
        assert!(err.is_not_found());
        let err = Error::backend("read", BackendError::Unavailable("timeout".into()));
        assert!(!err.is_not_found());
    }
}
