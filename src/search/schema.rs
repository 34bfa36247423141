use serde::{Deserialize, Serialize};

use crate::models::Product;

/// Requested ordering of search candidates / 搜索结果排序方式
///
/// Only `Relevance` uses the scorer's ordering; the other modes re-sort
/// the candidate set by the named field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Relevance,
    PriceAsc,
    PriceDesc,
    Name,
    Newest,
}

/// One scored search hit / 单条评分结果
///
/// `relevance_score` is 0 only in browse mode (empty query pass-through);
/// scored searches never return zero-score entries. `matched_fields` is
/// advisory display metadata and does not feed back into ranking.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredResult {
    pub product: Product,
    pub relevance_score: i64,
    pub matched_fields: Vec<String>,
}
