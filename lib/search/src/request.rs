//! Search request types
//!
//! Requests deserialize from camelCase JSON with the same defaults as the
//! builder constructors.

use serde::{Deserialize, Serialize};

use docmap_core::{SearchKind, VectorDistance};

/// Fields searched when a text request names none
pub const DEFAULT_TEXT_FIELDS: &[&str] = &["content", "title", "summary"];

/// Field scored when a text request names none
pub const DEFAULT_SCORE_FIELD: &str = "content";

pub const DEFAULT_VECTOR_LIMIT: usize = 10;
pub const DEFAULT_TEXT_LIMIT: usize = 100;
pub const DEFAULT_FUSION_WEIGHT: f64 = 0.5;

fn default_vector_limit() -> usize {
    DEFAULT_VECTOR_LIMIT
}

fn default_text_limit() -> usize {
    DEFAULT_TEXT_LIMIT
}

fn default_weight() -> f64 {
    DEFAULT_FUSION_WEIGHT
}

/// Nearest-neighbour search over one vector field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorRequest {
    pub path: String,
    pub vector: Vec<f32>,
    #[serde(default = "default_vector_limit")]
    pub limit: usize,
    #[serde(default)]
    pub distance: VectorDistance,
}

impl VectorRequest {
    pub fn new(path: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            path: path.into(),
            vector,
            limit: DEFAULT_VECTOR_LIMIT,
            distance: VectorDistance::default(),
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_distance(mut self, distance: VectorDistance) -> Self {
        self.distance = distance;
        self
    }
}

/// How text predicates over several fields combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    /// At least one field contains any of the terms
    #[default]
    Any,
    /// Every field contains all of the terms
    All,
}

/// Full-text search over one or more fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRequest {
    pub text: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub mode: TextMode,
    #[serde(default)]
    pub highlight_fields: Vec<String>,
    #[serde(default = "default_text_limit")]
    pub limit: usize,
}

impl TextRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fields: Vec::new(),
            mode: TextMode::default(),
            highlight_fields: Vec::new(),
            limit: DEFAULT_TEXT_LIMIT,
        }
    }

    #[must_use]
    pub fn with_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: TextMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_highlights<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.highlight_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Fields the predicate applies to, falling back to the defaults
    pub fn effective_fields(&self) -> Vec<&str> {
        if self.fields.is_empty() {
            DEFAULT_TEXT_FIELDS.to_vec()
        } else {
            self.fields.iter().map(String::as_str).collect()
        }
    }

    /// Field ranked by text relevance: the first configured field
    pub fn score_field(&self) -> &str {
        self.fields
            .first()
            .map_or(DEFAULT_SCORE_FIELD, String::as_str)
    }
}

/// How hybrid results are ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionMethod {
    /// Reciprocal rank fusion
    #[default]
    Rrf,
    /// Linear combination of vector similarity and text score
    Weighted,
}

/// Vector and text search combined. Weights are used as given; they are not
/// required to sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridRequest {
    pub vector: VectorRequest,
    pub text: TextRequest,
    #[serde(default = "default_weight")]
    pub vector_weight: f64,
    #[serde(default = "default_weight")]
    pub text_weight: f64,
    #[serde(default)]
    pub fusion: FusionMethod,
}

impl HybridRequest {
    pub fn new(vector: VectorRequest, text: TextRequest) -> Self {
        Self {
            vector,
            text,
            vector_weight: DEFAULT_FUSION_WEIGHT,
            text_weight: DEFAULT_FUSION_WEIGHT,
            fusion: FusionMethod::default(),
        }
    }

    #[must_use]
    pub fn with_weights(mut self, vector_weight: f64, text_weight: f64) -> Self {
        self.vector_weight = vector_weight;
        self.text_weight = text_weight;
        self
    }

    #[must_use]
    pub fn with_fusion(mut self, fusion: FusionMethod) -> Self {
        self.fusion = fusion;
        self
    }

    /// Hybrid searches return as many results as the vector half asks for
    #[inline]
    pub fn limit(&self) -> usize {
        self.vector.limit
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SearchRequest {
    Vector(VectorRequest),
    Text(TextRequest),
    Hybrid(HybridRequest),
}

impl SearchRequest {
    pub fn kind(&self) -> SearchKind {
        match self {
            SearchRequest::Vector(_) => SearchKind::Vector,
            SearchRequest::Text(_) => SearchKind::FullText,
            SearchRequest::Hybrid(_) => SearchKind::Hybrid,
        }
    }

    pub fn limit(&self) -> usize {
        match self {
            SearchRequest::Vector(request) => request.limit,
            SearchRequest::Text(request) => request.limit,
            SearchRequest::Hybrid(request) => request.limit(),
        }
    }
}

impl From<VectorRequest> for SearchRequest {
    fn from(request: VectorRequest) -> Self {
        SearchRequest::Vector(request)
    }
}

impl From<TextRequest> for SearchRequest {
    fn from(request: TextRequest) -> Self {
        SearchRequest::Text(request)
    }
}

impl From<HybridRequest> for SearchRequest {
    fn from(request: HybridRequest) -> Self {
        SearchRequest::Hybrid(request)
    }
}
