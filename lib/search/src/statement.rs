//! Query statement synthesis
//!
//! Each builder returns the statement text plus its parameter list. Field
//! names are validated and inlined as property accessors; every
//! caller-supplied value travels as a parameter.

use serde::{Deserialize, Serialize};

use docmap_core::value::path_segments;
use docmap_core::{Error, Result, Value};

use crate::request::{
    FusionMethod, HybridRequest, SearchRequest, TextMode, TextRequest, VectorRequest,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
}

impl Parameter {
    pub fn new(name: &str, value: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// A parameterized query, optionally carrying the search request it was
/// synthesized from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub query: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<SearchRequest>,
}

impl QuerySpec {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            parameters: Vec::new(),
            plan: None,
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

/// Build the statement for any search request
pub fn build(request: &SearchRequest) -> Result<QuerySpec> {
    let mut spec = match request {
        SearchRequest::Vector(r) => vector_statement(r),
        SearchRequest::Text(r) => text_statement(r),
        SearchRequest::Hybrid(r) => hybrid_statement(r),
    }
    .map_err(|message| Error::Search { kind: request.kind(), message })?;
    spec.plan = Some(request.clone());
    Ok(spec)
}

/// Property accessor for a field path: `/a/b` and `a.b` both become `c.a.b`.
/// Each segment must be an identifier.
pub fn accessor(path: &str) -> std::result::Result<String, String> {
    let segments = path_segments(path);
    if segments.is_empty() {
        return Err(format!("invalid field path '{}'", path));
    }
    for segment in &segments {
        if !is_identifier(segment) {
            return Err(format!("invalid field path '{}'", path));
        }
    }
    Ok(format!("c.{}", segments.join(".")))
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn distance_expr(accessor: &str, request: &VectorRequest) -> String {
    format!(
        "VectorDistance({}, @vector, false, {{'distanceFunction': '{}'}})",
        accessor,
        request.distance.as_str()
    )
}

/// Text predicate over the request's fields and the relevance expression
/// over its scoring field
fn text_parts(request: &TextRequest) -> std::result::Result<(String, String), String> {
    let (function, joiner) = match request.mode {
        TextMode::Any => ("FullTextContains", " OR "),
        TextMode::All => ("FullTextContainsAll", " AND "),
    };
    let conditions = request
        .effective_fields()
        .into_iter()
        .map(|field| accessor(field).map(|a| format!("{}({}, @searchText)", function, a)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let score = format!("FullTextScore({}, @searchText)", accessor(request.score_field())?);
    Ok((format!("({})", conditions.join(joiner)), score))
}

fn vector_statement(request: &VectorRequest) -> std::result::Result<QuerySpec, String> {
    if request.vector.is_empty() {
        return Err("query vector is empty".into());
    }
    let field = accessor(&request.path)?;
    let distance = distance_expr(&field, request);

    let mut spec = QuerySpec::new(format!(
        "SELECT TOP @limit c AS document, {distance} AS distance, 1 - {distance} AS similarityScore \
         FROM c WHERE IS_DEFINED({field}) ORDER BY {distance}",
    ));
    spec.parameters = vec![
        Parameter::new("@limit", request.limit as i64),
        Parameter::new("@vector", request.vector.clone()),
    ];
    Ok(spec)
}

fn text_statement(request: &TextRequest) -> std::result::Result<QuerySpec, String> {
    if request.text.trim().is_empty() {
        return Err("search text is empty".into());
    }
    for field in &request.highlight_fields {
        accessor(field)?;
    }
    let (predicate, score) = text_parts(request)?;

    let mut spec = QuerySpec::new(format!(
        "SELECT TOP @limit c AS document, {score} AS textScore \
         FROM c WHERE {predicate} ORDER BY RANK {score}",
    ));
    spec.parameters = vec![
        Parameter::new("@limit", request.limit as i64),
        Parameter::new("@searchText", request.text.as_str()),
    ];
    Ok(spec)
}

fn hybrid_statement(request: &HybridRequest) -> std::result::Result<QuerySpec, String> {
    if request.vector.vector.is_empty() {
        return Err("query vector is empty".into());
    }
    if request.text.text.trim().is_empty() {
        return Err("search text is empty".into());
    }
    if !request.vector_weight.is_finite() || !request.text_weight.is_finite() {
        return Err("fusion weights must be finite numbers".into());
    }

    let field = accessor(&request.vector.path)?;
    let distance = distance_expr(&field, &request.vector);
    let (predicate, score) = text_parts(&request.text)?;
    let projection = format!(
        "c AS document, {distance} AS distance, 1 - {distance} AS vectorScore, {score} AS textScore"
    );
    let filter = format!("IS_DEFINED({field}) AND {predicate}");

    let query = match request.fusion {
        FusionMethod::Rrf => format!(
            "SELECT TOP @limit {projection} FROM c WHERE {filter} \
             ORDER BY RANK RRF({distance}, {score}, [{}, {}])",
            request.vector_weight, request.text_weight,
        ),
        FusionMethod::Weighted => {
            let combined =
                format!("@vectorWeight * (1 - {distance}) + @textWeight * {score}");
            format!(
                "SELECT TOP @limit {projection}, {combined} AS combinedScore FROM c \
                 WHERE {filter} ORDER BY {combined} DESC",
            )
        }
    };

    let mut spec = QuerySpec::new(query);
    spec.parameters = vec![
        Parameter::new("@limit", request.limit() as i64),
        Parameter::new("@vector", request.vector.vector.clone()),
        Parameter::new("@searchText", request.text.text.as_str()),
        Parameter::new("@vectorWeight", request.vector_weight),
        Parameter::new("@textWeight", request.text_weight),
    ];
    Ok(spec)
}
