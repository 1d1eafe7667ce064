//! Connection configuration

use serde::{Deserialize, Serialize};

/// Name used when a connection is not given one
pub const DEFAULT_CONNECTION: &str = "default";

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 9;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 3000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Backend endpoint, credentials, database name and retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub endpoint: String,
    #[serde(default)]
    pub key: String,
    pub database: String,
    /// Connect attempts before giving up
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Fixed delay between attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Deadline of one attempt; hitting it counts as a failed attempt
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub connection_name: Option<String>,
    #[serde(default)]
    pub user_agent_suffix: Option<String>,
}

impl ConnectionConfig {
    pub fn new(endpoint: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: String::new(),
            database: database.into(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            connection_name: None,
            user_agent_suffix: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = Some(name.into());
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.connection_name.as_deref().unwrap_or(DEFAULT_CONNECTION)
    }

    /// Attempts actually made; zero is treated as one
    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.retry_attempts.max(1)
    }

    /// User agent suffix sent with every request
    pub fn user_agent_suffix(&self) -> String {
        match &self.user_agent_suffix {
            Some(suffix) => suffix.clone(),
            None => format!(
                "rust ({}; {}) docmap/{}",
                std::env::consts::OS,
                std::env::consts::ARCH,
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let config: ConnectionConfig = serde_json::from_str(
            r#"{"endpoint": "https://localhost:8081", "database": "app"}"#,
        )
        .unwrap();
        assert_eq!(config.retry_attempts, 9);
        assert_eq!(config.retry_delay_ms, 3000);
        assert_eq!(config.name(), DEFAULT_CONNECTION);
        assert_eq!(config, ConnectionConfig::new("https://localhost:8081", "app"));
    }

    #[test]
    fn test_user_agent_suffix() {
        let config = ConnectionConfig::new("e", "d");
        let suffix = config.user_agent_suffix();
        assert!(suffix.starts_with("rust ("));
        assert!(suffix.ends_with(&format!("docmap/{}", env!("CARGO_PKG_VERSION"))));

        let mut config = config;
        config.user_agent_suffix = Some("my-app".into());
        assert_eq!(config.user_agent_suffix(), "my-app");
    }

    #[test]
    fn test_zero_attempts_means_one() {
        let config = ConnectionConfig::new("e", "d").with_retry(0, 10);
        assert_eq!(config.max_attempts(), 1);
    }
}
