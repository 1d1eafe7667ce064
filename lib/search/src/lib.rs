//! # docmap Search
//!
//! Vector, full-text and hybrid search over document containers.
//!
//! A [`SearchRequest`] is turned into a parameterized [`QuerySpec`], run by a
//! [`QueryExecutor`] and normalized into ranked [`SearchResult`]s:
//!
//! - **Vector**: top-k by ascending distance, score = `1 - distance`
//! - **Full-text**: containment predicate over the configured fields, ranked
//!   by text relevance of the first field
//! - **Hybrid**: both predicates, fused with reciprocal rank fusion or a
//!   weighted sum
//!
//! Scoring columns never leak into the returned documents; they surface in
//! [`SearchResult::score`], [`SearchResult::rank`] and [`SearchDetails`].

pub mod fusion;
pub mod request;
pub mod result;
pub mod service;
pub mod statement;

pub use fusion::{rrf_score, weighted_score, RRF_K};
pub use request::{
    FusionMethod, HybridRequest, SearchRequest, TextMode, TextRequest, VectorRequest,
    DEFAULT_SCORE_FIELD, DEFAULT_TEXT_FIELDS,
};
pub use result::{
    normalize, strip_search_fields, RankingDetails, SearchDetails, SearchResult, SEARCH_FIELDS,
};
pub use service::{FeedOptions, QueryExecutor, QueryResponse, SearchService};
pub use statement::{Parameter, QuerySpec};
