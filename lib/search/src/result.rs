//! Search results and result normalization

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use docmap_core::{from_document, strip_envelope, Document, Result, Value};

use crate::fusion;
use crate::request::{FusionMethod, HybridRequest, SearchRequest};

/// Scoring columns a search statement adds next to the stored item
pub const SEARCH_FIELDS: &[&str] = &[
    "similarityScore",
    "distance",
    "textScore",
    "combinedScore",
    "vectorScore",
    "vectorRank",
    "textRank",
    "fusionScore",
    "matchedTerms",
    "highlights",
];

/// Column holding the stored item in envelope-shaped rows
pub const DOCUMENT_COLUMN: &str = "document";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingDetails {
    pub vector_rank: usize,
    pub text_rank: usize,
    pub fusion_score: f64,
}

/// Kind-specific scoring detail of one result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SearchDetails {
    #[serde(rename_all = "camelCase")]
    Vector { similarity_score: f64, distance: f64 },
    #[serde(rename_all = "camelCase")]
    Text {
        text_score: f64,
        matched_terms: Vec<String>,
        highlights: BTreeMap<String, Vec<String>>,
    },
    #[serde(rename_all = "camelCase")]
    Hybrid {
        combined_score: f64,
        vector_score: f64,
        text_score: f64,
        ranking: RankingDetails,
    },
}

/// One ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Stored item without scoring columns or envelope fields
    pub document: Document,
    pub score: f64,
    /// 1-based position in the result sequence
    pub rank: usize,
    pub details: SearchDetails,
}

impl SearchResult {
    /// Decode the document into an entity type
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        from_document(self.document.clone())
    }
}

/// Remove scoring columns from a document
pub fn strip_search_fields(doc: &mut Document) {
    for field in SEARCH_FIELDS {
        doc.remove(*field);
    }
}

/// Split a result row into the stored item and its scoring columns.
///
/// Rows come either as `{document: {...}, <score columns>}` or flat, with the
/// score columns beside the item fields.
fn split_row(mut row: Document) -> (Document, Document) {
    let enveloped = matches!(row.get(DOCUMENT_COLUMN), Some(Value::Map(_)))
        && row
            .keys()
            .all(|k| k == DOCUMENT_COLUMN || SEARCH_FIELDS.contains(&k.as_str()));

    let mut document = if enveloped {
        match row.remove(DOCUMENT_COLUMN) {
            Some(Value::Map(doc)) => doc,
            _ => Document::new(),
        }
    } else {
        row.clone()
    };

    let scores: Document = row
        .into_iter()
        .filter(|(k, _)| SEARCH_FIELDS.contains(&k.as_str()))
        .collect();

    strip_search_fields(&mut document);
    strip_envelope(&mut document);
    (document, scores)
}

fn number(scores: &Document, field: &str) -> Option<f64> {
    scores.get(field).and_then(Value::as_f64)
}

fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

struct Row {
    document: Document,
    scores: Document,
}

/// Turn raw rows into ranked results for `request`.
///
/// Results are ordered by score, highest first, keeping backend order for
/// ties, and truncated to the request's limit. RRF hybrid rows arrive
/// already fused and keep backend order.
pub fn normalize(request: &SearchRequest, rows: Vec<Document>) -> Vec<SearchResult> {
    let rows: Vec<Row> = rows
        .into_iter()
        .map(|row| {
            let (document, scores) = split_row(row);
            Row { document, scores }
        })
        .collect();

    let mut scored: Vec<(Document, f64, SearchDetails)> = match request {
        SearchRequest::Vector(_) => rows.into_iter().map(vector_result).collect(),
        SearchRequest::Text(_) => rows.into_iter().map(text_result).collect(),
        SearchRequest::Hybrid(hybrid) => hybrid_results(hybrid, rows),
    };

    // backend-fused RRF order is final; everything else is ranked by score,
    // stable so equal scores keep backend order
    let backend_fused = matches!(
        request,
        SearchRequest::Hybrid(HybridRequest { fusion: FusionMethod::Rrf, .. })
    );
    if !backend_fused {
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    }
    scored.truncate(request.limit());

    scored
        .into_iter()
        .enumerate()
        .map(|(index, (document, score, details))| SearchResult {
            document,
            score,
            rank: index + 1,
            details,
        })
        .collect()
}

fn vector_result(row: Row) -> (Document, f64, SearchDetails) {
    let distance = number(&row.scores, "distance");
    let similarity = number(&row.scores, "similarityScore")
        .or_else(|| distance.map(|d| 1.0 - d))
        .unwrap_or(0.0);
    let details = SearchDetails::Vector {
        similarity_score: similarity,
        distance: distance.unwrap_or(1.0 - similarity),
    };
    (row.document, similarity, details)
}

fn text_result(row: Row) -> (Document, f64, SearchDetails) {
    let text_score = number(&row.scores, "textScore").unwrap_or(0.0);
    let matched_terms = row
        .scores
        .get("matchedTerms")
        .map(strings)
        .unwrap_or_default();
    let highlights = match row.scores.get("highlights") {
        Some(Value::Map(map)) => map
            .iter()
            .map(|(field, fragments)| (field.clone(), strings(fragments)))
            .collect(),
        _ => BTreeMap::new(),
    };
    let details = SearchDetails::Text {
        text_score,
        matched_terms,
        highlights,
    };
    (row.document, text_score, details)
}

fn hybrid_results(request: &HybridRequest, rows: Vec<Row>) -> Vec<(Document, f64, SearchDetails)> {
    let vector_scores: Vec<f64> = rows
        .iter()
        .map(|row| {
            number(&row.scores, "vectorScore")
                .or_else(|| number(&row.scores, "distance").map(|d| 1.0 - d))
                .unwrap_or(0.0)
        })
        .collect();
    let text_scores: Vec<f64> = rows
        .iter()
        .map(|row| number(&row.scores, "textScore").unwrap_or(0.0))
        .collect();
    let vector_ranks = fusion::ranks(&vector_scores);
    let text_ranks = fusion::ranks(&text_scores);

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            let reported_rank =
                |field: &str| number(&row.scores, field).map(|r| r.max(1.0) as usize);
            let vector_rank = reported_rank("vectorRank").unwrap_or(vector_ranks[i]);
            let text_rank = reported_rank("textRank").unwrap_or(text_ranks[i]);

            let (fallback, fallback_fusion) = match request.fusion {
                FusionMethod::Rrf => {
                    let rrf = fusion::rrf_score(&[
                        (request.vector_weight, vector_rank),
                        (request.text_weight, text_rank),
                    ]);
                    // the fused order is the backend's, so the score follows position
                    let positional = number(&row.scores, "fusionScore")
                        .unwrap_or_else(|| fusion::rrf_score(&[(1.0, i + 1)]));
                    (positional, rrf)
                }
                FusionMethod::Weighted => (
                    fusion::weighted_score(
                        request.vector_weight,
                        vector_scores[i],
                        request.text_weight,
                        text_scores[i],
                    ),
                    0.0,
                ),
            };
            let combined = number(&row.scores, "combinedScore").unwrap_or(fallback);
            let fusion_score = number(&row.scores, "fusionScore").unwrap_or(fallback_fusion);

            let details = SearchDetails::Hybrid {
                combined_score: combined,
                vector_score: vector_scores[i],
                text_score: text_scores[i],
                ranking: RankingDetails {
                    vector_rank,
                    text_rank,
                    fusion_score,
                },
            };
            (row.document, combined, details)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{HybridRequest, TextRequest, VectorRequest};
    use docmap_core::to_document;
    use serde_json::json;

    fn rows(values: serde_json::Value) -> Vec<Document> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| to_document(v).unwrap())
            .collect()
    }

    #[test]
    fn test_vector_results_rank_and_strip() {
        let request = SearchRequest::Vector(VectorRequest::new("/embedding", vec![1.0]));
        let results = normalize(
            &request,
            rows(json!([
                {"id": "a", "title": "A", "similarityScore": 0.95, "distance": 0.05, "_etag": "x"},
                {"id": "b", "title": "B", "similarityScore": 0.85, "distance": 0.15},
                {"id": "c", "title": "C", "similarityScore": 0.60, "distance": 0.40},
            ])),
        );

        let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
        let scores: Vec<f64> = results.iter().map(|r| r.score).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(scores, vec![0.95, 0.85, 0.60]);
        for result in &results {
            assert!(!result.document.contains_key("similarityScore"));
            assert!(!result.document.contains_key("distance"));
            assert!(!result.document.contains_key("_etag"));
            assert!(result.document.contains_key("title"));
        }
        assert_eq!(
            results[0].details,
            SearchDetails::Vector { similarity_score: 0.95, distance: 0.05 }
        );
    }

    #[test]
    fn test_enveloped_rows() {
        let request = SearchRequest::Vector(VectorRequest::new("/embedding", vec![1.0]));
        let results = normalize(
            &request,
            rows(json!([
                {"document": {"id": "a", "document": "nested field"}, "distance": 0.2, "similarityScore": 0.8},
            ])),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.get("id"), Some(&Value::from("a")));
        assert_eq!(results[0].document.get("document"), Some(&Value::from("nested field")));
        assert!((results[0].score - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_flat_row_with_document_field_is_not_unwrapped() {
        let request = SearchRequest::Text(TextRequest::new("x"));
        let results = normalize(
            &request,
            rows(json!([{"id": "a", "document": {"x": 1}, "textScore": 2.0}])),
        );
        assert!(results[0].document.contains_key("id"));
        assert!(results[0].document.contains_key("document"));
    }

    #[test]
    fn test_text_results_defaults() {
        let request = SearchRequest::Text(TextRequest::new("rust"));
        let results = normalize(
            &request,
            rows(json!([
                {"id": "a", "textScore": 1.5, "matchedTerms": ["rust"], "highlights": {"title": ["<em>Rust</em>"]}},
                {"id": "b"},
            ])),
        );
        assert_eq!(results[0].score, 1.5);
        match &results[0].details {
            SearchDetails::Text { matched_terms, highlights, .. } => {
                assert_eq!(matched_terms, &vec!["rust".to_string()]);
                assert_eq!(highlights["title"], vec!["<em>Rust</em>".to_string()]);
            }
            other => panic!("unexpected details {:?}", other),
        }
        assert_eq!(results[1].score, 0.0);
        assert!(!results[0].document.contains_key("matchedTerms"));
    }

    #[test]
    fn test_weighted_fusion_fallback() {
        let request = SearchRequest::Hybrid(
            HybridRequest::new(VectorRequest::new("v", vec![1.0]), TextRequest::new("x"))
                .with_weights(0.6, 0.4)
                .with_fusion(FusionMethod::Weighted),
        );
        let results = normalize(
            &request,
            rows(json!([{"id": "a", "vectorScore": 0.8, "textScore": 0.5}])),
        );
        assert!((results[0].score - 0.68).abs() < 1e-12);
        match results[0].details {
            SearchDetails::Hybrid { combined_score, ranking, .. } => {
                assert!((combined_score - 0.68).abs() < 1e-12);
                assert_eq!(ranking.vector_rank, 1);
                assert_eq!(ranking.fusion_score, 0.0);
            }
            ref other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_rrf_fallback_computes_ranks() {
        let request = SearchRequest::Hybrid(HybridRequest::new(
            VectorRequest::new("v", vec![1.0]),
            TextRequest::new("x"),
        ));
        let results = normalize(
            &request,
            rows(json!([
                {"id": "a", "vectorScore": 0.9, "textScore": 0.1},
                {"id": "b", "vectorScore": 0.5, "textScore": 3.0},
            ])),
        );
        // a: 0.5/61 + 0.5/62, b: 0.5/62 + 0.5/61, equal, backend order kept
        assert_eq!(results[0].document.get("id"), Some(&Value::from("a")));
        match results[1].details {
            SearchDetails::Hybrid { ranking, .. } => {
                assert_eq!(ranking.vector_rank, 2);
                assert_eq!(ranking.text_rank, 1);
            }
            ref other => panic!("unexpected details {:?}", other),
        }
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_rrf_keeps_backend_fused_order() {
        let request = SearchRequest::Hybrid(HybridRequest::new(
            VectorRequest::new("v", vec![1.0]),
            TextRequest::new("x"),
        ));
        // subset ranks alone would put "a" first
        let results = normalize(
            &request,
            rows(json!([
                {"document": {"id": "b"}, "vectorScore": 0.8, "textScore": 2.0},
                {"document": {"id": "a"}, "vectorScore": 0.9, "textScore": 1.0},
                {"document": {"id": "c"}, "vectorScore": 0.1, "textScore": 3.0},
            ])),
        );

        let ids: Vec<&str> = results
            .iter()
            .map(|r| r.document["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(results.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        match results[1].details {
            SearchDetails::Hybrid { ranking, .. } => {
                assert_eq!(ranking.vector_rank, 1);
                assert_eq!(ranking.text_rank, 3);
            }
            ref other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_results_truncated_to_limit() {
        let request = SearchRequest::Vector(VectorRequest::new("v", vec![1.0]).with_limit(2));
        let results = normalize(
            &request,
            rows(json!([
                {"id": "a", "similarityScore": 0.3},
                {"id": "b", "similarityScore": 0.9},
                {"id": "c", "similarityScore": 0.5},
            ])),
        );
        let ids: Vec<_> = results.iter().map(|r| r.document["id"].clone()).collect();
        assert_eq!(ids, vec![Value::from("b"), Value::from("c")]);
    }
}
