//! Search plan evaluation for the in-memory backend
//!
//! Produces rows shaped like the synthesized statements project them:
//! the stored item under `document` next to the score columns.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use docmap_core::{get_path, vector, Document, Value};
use docmap_search::fusion::{ranks, rrf_score, weighted_score};
use docmap_search::result::DOCUMENT_COLUMN;
use docmap_search::{FusionMethod, HybridRequest, SearchRequest, TextMode, TextRequest, VectorRequest};

use super::bm25::Bm25Index;

/// Evaluate a search plan over the candidate items
pub fn evaluate(plan: &SearchRequest, items: &[Document]) -> Vec<Document> {
    match plan {
        SearchRequest::Vector(request) => vector_rows(request, items),
        SearchRequest::Text(request) => text_rows(request, items),
        SearchRequest::Hybrid(request) => hybrid_rows(request, items),
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

fn row(doc: &Document, columns: Vec<(&str, Value)>) -> Document {
    let mut row = Document::new();
    row.insert(DOCUMENT_COLUMN.to_string(), Value::Map(doc.clone()));
    for (name, value) in columns {
        row.insert(name.to_string(), value);
    }
    row
}

/// Distance of every item that has the vector field, by item position
fn distances(request: &VectorRequest, items: &[Document]) -> Vec<(usize, f64)> {
    items
        .iter()
        .enumerate()
        .filter_map(|(i, doc)| {
            let stored = get_path(doc, &request.path)?.as_vector()?;
            let distance = vector::distance(request.distance, &stored, &request.vector);
            Some((i, f64::from(distance)))
        })
        .collect()
}

fn vector_rows(request: &VectorRequest, items: &[Document]) -> Vec<Document> {
    let mut scored = distances(request, items);
    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    scored.truncate(request.limit);

    scored
        .into_iter()
        .map(|(i, distance)| {
            row(
                &items[i],
                vec![
                    ("distance", Value::Float(distance)),
                    ("similarityScore", Value::Float(1.0 - distance)),
                ],
            )
        })
        .collect()
}

fn field_terms(doc: &Document, field: &str) -> Vec<String> {
    get_path(doc, field)
        .and_then(Value::as_text)
        .map(|text| Bm25Index::tokenize(&text))
        .unwrap_or_default()
}

/// Containment predicate: per field any/all of the terms, combined across
/// fields with OR/AND
fn text_matches(request: &TextRequest, doc: &Document, terms: &[String]) -> bool {
    if terms.is_empty() {
        return false;
    }
    let field_matches = |field: &&str| {
        let tokens = field_terms(doc, field);
        match request.mode {
            TextMode::Any => terms.iter().any(|t| tokens.contains(t)),
            TextMode::All => terms.iter().all(|t| tokens.contains(t)),
        }
    };
    let fields = request.effective_fields();
    match request.mode {
        TextMode::Any => fields.iter().any(field_matches),
        TextMode::All => fields.iter().all(field_matches),
    }
}

fn text_index(request: &TextRequest, items: &[Document]) -> Bm25Index {
    let mut index = Bm25Index::new();
    for (i, doc) in items.iter().enumerate() {
        let text = get_path(doc, request.score_field())
            .and_then(Value::as_text)
            .unwrap_or_default();
        index.insert(i, &text);
    }
    index
}

fn query_terms(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    for term in Bm25Index::tokenize(text) {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

fn highlight(text: &str, terms: &[String]) -> Option<String> {
    let mut hit = false;
    let words: Vec<String> = text
        .split(' ')
        .map(|word| {
            let normalized = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if terms.contains(&normalized) {
                hit = true;
                format!("<em>{}</em>", word)
            } else {
                word.to_string()
            }
        })
        .collect();
    hit.then(|| words.join(" "))
}

fn text_rows(request: &TextRequest, items: &[Document]) -> Vec<Document> {
    let terms = query_terms(&request.text);
    let index = text_index(request, items);

    let mut scored: Vec<(usize, f64)> = items
        .iter()
        .enumerate()
        .filter(|(_, doc)| text_matches(request, doc, &terms))
        .map(|(i, _)| (i, index.score(i, &request.text)))
        .collect();
    scored.sort_by(|a, b| descending(a.1, b.1));
    scored.truncate(request.limit);

    scored
        .into_iter()
        .map(|(i, score)| {
            let doc = &items[i];
            let fields = request.effective_fields();
            let matched: Vec<Value> = terms
                .iter()
                .filter(|term| fields.iter().any(|f| field_terms(doc, f).contains(*term)))
                .map(|term| Value::String(term.clone()))
                .collect();

            let mut highlights = BTreeMap::new();
            for field in &request.highlight_fields {
                let fragment = get_path(doc, field)
                    .and_then(Value::as_text)
                    .and_then(|text| highlight(&text, &terms));
                if let Some(fragment) = fragment {
                    highlights.insert(field.clone(), Value::Array(vec![Value::String(fragment)]));
                }
            }

            row(
                doc,
                vec![
                    ("textScore", Value::Float(score)),
                    ("matchedTerms", Value::Array(matched)),
                    ("highlights", Value::Map(highlights)),
                ],
            )
        })
        .collect()
}

fn hybrid_rows(request: &HybridRequest, items: &[Document]) -> Vec<Document> {
    let terms = query_terms(&request.text.text);
    let index = text_index(&request.text, items);

    let candidates: Vec<(usize, f64, f64)> = distances(&request.vector, items)
        .into_iter()
        .filter(|(i, _)| text_matches(&request.text, &items[*i], &terms))
        .map(|(i, distance)| (i, distance, index.score(i, &request.text.text)))
        .collect();

    let vector_scores: Vec<f64> = candidates.iter().map(|c| 1.0 - c.1).collect();
    let text_scores: Vec<f64> = candidates.iter().map(|c| c.2).collect();
    let vector_ranks = ranks(&vector_scores);
    let text_ranks = ranks(&text_scores);

    let mut fused: Vec<(f64, Document)> = candidates
        .iter()
        .enumerate()
        .map(|(n, &(i, distance, text_score))| {
            let mut columns = vec![
                ("distance", Value::Float(distance)),
                ("vectorScore", Value::Float(vector_scores[n])),
                ("textScore", Value::Float(text_score)),
                ("vectorRank", Value::Int(vector_ranks[n] as i64)),
                ("textRank", Value::Int(text_ranks[n] as i64)),
            ];
            let combined = match request.fusion {
                FusionMethod::Rrf => {
                    let rrf = rrf_score(&[
                        (request.vector_weight, vector_ranks[n]),
                        (request.text_weight, text_ranks[n]),
                    ]);
                    columns.push(("fusionScore", Value::Float(rrf)));
                    rrf
                }
                FusionMethod::Weighted => weighted_score(
                    request.vector_weight,
                    vector_scores[n],
                    request.text_weight,
                    text_score,
                ),
            };
            columns.push(("combinedScore", Value::Float(combined)));
            (combined, row(&items[i], columns))
        })
        .collect();

    fused.sort_by(|a, b| descending(a.0, b.0));
    fused.truncate(request.limit());
    fused.into_iter().map(|(_, row)| row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmap_core::to_document;
    use serde_json::json;

    fn items() -> Vec<Document> {
        [
            json!({"id": "a", "content": "rust async runtime", "embedding": [1.0, 0.0]}),
            json!({"id": "b", "content": "rust web framework rust", "embedding": [0.0, 1.0]}),
            json!({"id": "c", "content": "python notebooks", "embedding": [0.7, 0.7]}),
            json!({"id": "d", "content": "rust without vectors"}),
        ]
        .iter()
        .map(|v| to_document(v).unwrap())
        .collect()
    }

    fn ids(rows: &[Document]) -> Vec<String> {
        rows.iter()
            .map(|row| match row.get(DOCUMENT_COLUMN) {
                Some(Value::Map(doc)) => doc["id"].as_str().unwrap().to_string(),
                _ => panic!("row without document"),
            })
            .collect()
    }

    #[test]
    fn test_vector_rows_by_ascending_distance() {
        let plan = SearchRequest::Vector(VectorRequest::new("embedding", vec![1.0, 0.0]).with_limit(2));
        let rows = evaluate(&plan, &items());
        assert_eq!(ids(&rows), vec!["a", "c"]);
        let similarity = rows[0]["similarityScore"].as_f64().unwrap();
        assert!((similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_text_rows_with_terms_and_highlights() {
        let plan = SearchRequest::Text(
            TextRequest::new("rust")
                .with_fields(["content"])
                .with_highlights(["content"]),
        );
        let rows = evaluate(&plan, &items());
        assert_eq!(rows.len(), 3);
        assert_eq!(ids(&rows)[0], "b");
        assert_eq!(rows[0]["matchedTerms"], Value::Array(vec![Value::from("rust")]));
        match &rows[0]["highlights"] {
            Value::Map(map) => assert_eq!(
                map["content"],
                Value::Array(vec![Value::from("<em>rust</em> web framework <em>rust</em>")])
            ),
            other => panic!("unexpected highlights {:?}", other),
        }
    }

    #[test]
    fn test_text_mode_all() {
        let plan = SearchRequest::Text(
            TextRequest::new("rust async")
                .with_fields(["content"])
                .with_mode(TextMode::All),
        );
        assert_eq!(ids(&evaluate(&plan, &items())), vec!["a"]);
    }

    #[test]
    fn test_hybrid_requires_vector_and_text() {
        let request = HybridRequest::new(
            VectorRequest::new("embedding", vec![1.0, 0.0]),
            TextRequest::new("rust").with_fields(["content"]),
        );
        let rows = evaluate(&SearchRequest::Hybrid(request.clone()), &items());
        assert_eq!(ids(&rows), vec!["a", "b"]);
        assert_eq!(rows[0]["vectorRank"], Value::Int(1));
        assert!(rows[0].contains_key("fusionScore"));

        let weighted = request.with_weights(1.0, 0.0).with_fusion(FusionMethod::Weighted);
        let rows = evaluate(&SearchRequest::Hybrid(weighted), &items());
        let combined = rows[0]["combinedScore"].as_f64().unwrap();
        assert!((combined - 1.0).abs() < 1e-6);
        assert!(!rows[0].contains_key("fusionScore"));
    }
}
