//! Product search module - relevance scoring over the catalog / 产品搜索模块
//!
//! Architecture principle: the scorer only computes, it does not control
//! flow / 架构原则：评分器只计算，不控制流程
//! - The engine is a pure function over a catalog snapshot plus a query;
//!   it performs no I/O, no logging, no caching.
//! - Filtering (category/domain/price) happens before scoring, in the
//!   catalog provider. Re-sorting for non-relevance sort modes and
//!   pagination happen after scoring, in the HTTP layer.
//! - The result cache is a best-effort optimization owned by the caller;
//!   a miss always falls back to recomputation.

pub mod cache;
pub mod engine;
pub mod schema;

pub use cache::SearchCache;
pub use engine::{fuzzy_match, matched_fields, normalize_query, relevance_score, search};
pub use schema::{ScoredResult, SortBy};
