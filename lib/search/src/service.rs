//! Search service
//!
//! Synthesizes a statement for each request, runs it through a
//! [`QueryExecutor`] and normalizes the rows into ranked results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use docmap_core::{BackendError, Document, Error, PartitionValue, Result};

use crate::request::{HybridRequest, SearchRequest, TextRequest, VectorRequest};
use crate::result::{normalize, SearchResult};
use crate::statement::{build, QuerySpec};

/// Per-query options forwarded to the executor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedOptions {
    #[serde(default)]
    pub max_item_count: Option<usize>,
    /// Restrict the query to one logical partition
    #[serde(default)]
    pub partition_key: Option<PartitionValue>,
}

/// Rows returned by one query, with the backend's cost accounting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub resources: Vec<Document>,
    pub request_charge: f64,
}

/// Runs parameterized queries against one container
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(
        &self,
        spec: &QuerySpec,
        options: &FeedOptions,
    ) -> std::result::Result<QueryResponse, BackendError>;
}

/// Vector, full-text and hybrid search over one container
#[derive(Clone)]
pub struct SearchService {
    executor: Arc<dyn QueryExecutor>,
}

impl std::fmt::Debug for SearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchService").finish_non_exhaustive()
    }
}

impl SearchService {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    pub async fn vector_search(
        &self,
        request: VectorRequest,
        options: Option<FeedOptions>,
    ) -> Result<Vec<SearchResult>> {
        self.search(&SearchRequest::Vector(request), options).await
    }

    pub async fn full_text_search(
        &self,
        request: TextRequest,
        options: Option<FeedOptions>,
    ) -> Result<Vec<SearchResult>> {
        self.search(&SearchRequest::Text(request), options).await
    }

    pub async fn hybrid_search(
        &self,
        request: HybridRequest,
        options: Option<FeedOptions>,
    ) -> Result<Vec<SearchResult>> {
        self.search(&SearchRequest::Hybrid(request), options).await
    }

    /// Run any search request.
    ///
    /// Executor failures are reported as [`Error::Search`] naming the search
    /// kind. Nothing is retried here.
    pub async fn search(
        &self,
        request: &SearchRequest,
        options: Option<FeedOptions>,
    ) -> Result<Vec<SearchResult>> {
        let kind = request.kind();
        let spec = build(request)?;
        tracing::debug!("Running {} search: {}", kind, spec.query);

        let mut options = options.unwrap_or_default();
        match request {
            SearchRequest::Vector(r) => options.max_item_count = Some(r.limit),
            SearchRequest::Hybrid(r) => options.max_item_count = Some(r.limit()),
            SearchRequest::Text(_) => {}
        }

        let response = self.executor.execute(&spec, &options).await.map_err(|err| {
            tracing::error!("{} search failed: {}", kind, err);
            Error::Search {
                kind,
                message: err.to_string(),
            }
        })?;

        tracing::debug!(
            "{} search completed. Found {} results. Request charge: {}",
            kind,
            response.resources.len(),
            response.request_charge
        );

        Ok(normalize(request, response.resources))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmap_core::{to_document, SearchKind, Value};
    use parking_lot::Mutex;
    use serde_json::json;

    /// Returns canned rows and records what it was asked to run
    struct CannedExecutor {
        rows: std::result::Result<Vec<Document>, BackendError>,
        seen: Mutex<Vec<(QuerySpec, FeedOptions)>>,
    }

    impl CannedExecutor {
        fn new(rows: serde_json::Value) -> Arc<Self> {
            let rows = rows
                .as_array()
                .unwrap()
                .iter()
                .map(|r| to_document(r).unwrap())
                .collect();
            Arc::new(Self { rows: Ok(rows), seen: Mutex::new(Vec::new()) })
        }

        fn failing(err: BackendError) -> Arc<Self> {
            Arc::new(Self { rows: Err(err), seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl QueryExecutor for CannedExecutor {
        async fn execute(
            &self,
            spec: &QuerySpec,
            options: &FeedOptions,
        ) -> std::result::Result<QueryResponse, BackendError> {
            self.seen.lock().push((spec.clone(), options.clone()));
            self.rows.clone().map(|resources| QueryResponse { resources, request_charge: 2.5 })
        }
    }

    #[tokio::test]
    async fn test_vector_search_sets_max_item_count() {
        let executor = CannedExecutor::new(json!([
            {"id": "a", "similarityScore": 0.95, "distance": 0.05},
            {"id": "b", "similarityScore": 0.85, "distance": 0.15},
            {"id": "c", "similarityScore": 0.60, "distance": 0.40},
        ]));
        let service = SearchService::new(executor.clone());

        let results = service
            .vector_search(VectorRequest::new("/embedding", vec![0.1, 0.2]).with_limit(3), None)
            .await
            .unwrap();
        assert_eq!(results.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(results[0].document.get("id"), Some(&Value::from("a")));

        let seen = executor.seen.lock();
        assert_eq!(seen[0].1.max_item_count, Some(3));
        assert!(seen[0].0.plan.is_some());
    }

    #[tokio::test]
    async fn test_text_search_keeps_caller_options() {
        let executor = CannedExecutor::new(json!([]));
        let service = SearchService::new(executor.clone());
        let options = FeedOptions {
            max_item_count: Some(7),
            partition_key: Some(PartitionValue::from("tenant-1")),
        };

        let results = service
            .full_text_search(TextRequest::new("rust"), Some(options.clone()))
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(executor.seen.lock()[0].1, options);
    }

    #[tokio::test]
    async fn test_executor_errors_are_wrapped() {
        let service = SearchService::new(CannedExecutor::failing(BackendError::Other(
            "Database error".into(),
        )));

        let err = service
            .vector_search(VectorRequest::new("/embedding", vec![1.0]), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "vector search failed: Database error");

        let err = service
            .full_text_search(TextRequest::new("rust"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Search { kind: SearchKind::FullText, .. }));

        let err = service
            .hybrid_search(
                HybridRequest::new(VectorRequest::new("v", vec![1.0]), TextRequest::new("x")),
                None,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("hybrid search failed"));
    }
}
