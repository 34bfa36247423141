//! Search, suggestions and taxonomy endpoints / 搜索相关接口
//!
//! The handler fetches the (pre-filtered) catalog snapshot, runs the pure
//! scorer over it, then applies sort mode, pagination and best-effort
//! analytics/caching. The scorer itself stays free of all of this.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use catalog_backend::catalog::{CatalogFilter, CatalogProvider, DbCatalog};
use catalog_backend::search::{self, ScoredResult, SortBy};

use super::{catalog_error, db_error};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default, rename = "minPrice")]
    pub min_price: Option<f64>,
    #[serde(default, rename = "maxPrice")]
    pub max_price: Option<f64>,
    #[serde(default, rename = "sortBy")]
    pub sort_by: SortBy,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    20
}

/// GET /api/search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let filter = CatalogFilter {
        category: params.category.clone().filter(|c| !c.is_empty()),
        domain: params.domain.clone().filter(|d| !d.is_empty()),
        min_price: params.min_price,
        max_price: params.max_price,
    };

    let query = search::normalize_query(&params.q);

    let mut results = if query.is_empty() {
        // 浏览模式：整个（过滤后的）目录按原顺序返回，不评分
        let catalog = DbCatalog::new(state.db.clone())
            .get_products_filtered(&filter)
            .await
            .map_err(catalog_error)?;
        search::search(&catalog, "")
    } else {
        let cache_key = cache_key(&query, &filter);
        match state.search_cache.get(&cache_key) {
            Some(hit) => hit,
            None => {
                let catalog = DbCatalog::new(state.db.clone())
                    .get_products_filtered(&filter)
                    .await
                    .map_err(catalog_error)?;
                let scored = search::search(&catalog, &query);
                state.search_cache.put(cache_key, scored.clone());
                log_search_analytics(&state, &query, &filter, scored.len()).await;
                scored
            }
        }
    };

    apply_sort(&mut results, params.sort_by);

    let total = results.len();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);
    let pages = total.div_ceil(limit);
    // 仅相关性排序且有查询词时携带评分元数据
    let with_relevance = params.sort_by == SortBy::Relevance && !query.is_empty();

    let items: Vec<Value> = results
        .into_iter()
        .skip((page - 1) * limit)
        .take(limit)
        .map(|result| result_item(result, with_relevance))
        .collect();

    Ok(Json(json!({
        "results": items,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": pages,
        },
        "filters": {
            "query": query,
            "category": filter.category,
            "domain": filter.domain,
            "minPrice": filter.min_price,
            "maxPrice": filter.max_price,
            "sortBy": params.sort_by,
        }
    })))
}

fn cache_key(query: &str, filter: &CatalogFilter) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        query,
        filter.category.as_deref().unwrap_or(""),
        filter.domain.as_deref().unwrap_or(""),
        filter.min_price.map(|p| p.to_string()).unwrap_or_default(),
        filter.max_price.map(|p| p.to_string()).unwrap_or_default(),
    )
}

/// Re-sort the candidate set for non-relevance sort modes / 非相关性排序
fn apply_sort(results: &mut [ScoredResult], sort_by: SortBy) {
    match sort_by {
        // 评分器已按分数降序（同分保持目录顺序）
        SortBy::Relevance => {}
        SortBy::PriceAsc => results.sort_by(|a, b| compare_prices(a, b, false)),
        SortBy::PriceDesc => results.sort_by(|a, b| compare_prices(a, b, true)),
        SortBy::Name => results.sort_by(|a, b| a.product.name.cmp(&b.product.name)),
        SortBy::Newest => {
            results.sort_by(|a, b| b.product.created_at.cmp(&a.product.created_at))
        }
    }
}

/// 无价产品在两个方向上都排在最后
fn compare_prices(a: &ScoredResult, b: &ScoredResult, descending: bool) -> std::cmp::Ordering {
    match (a.product.price, b.product.price) {
        (Some(x), Some(y)) => {
            let ordering = x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

fn result_item(result: ScoredResult, with_relevance: bool) -> Value {
    let mut value = serde_json::to_value(&result.product).unwrap_or(Value::Null);
    if with_relevance {
        if let Value::Object(ref mut map) = value {
            map.insert("relevance_score".to_string(), json!(result.relevance_score));
            map.insert("matched_fields".to_string(), json!(result.matched_fields));
        }
    }
    value
}

/// Best-effort analytics row; failures are logged, never surfaced
/// 搜索分析记录，失败只告警
async fn log_search_analytics(state: &AppState, query: &str, filter: &CatalogFilter, result_count: usize) {
    let outcome = sqlx::query(
        "INSERT INTO search_analytics (query, category, domain, result_count, search_date) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(query)
    .bind(&filter.category)
    .bind(&filter.domain)
    .bind(result_count as i64)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await;

    if let Err(err) = outcome {
        tracing::warn!("failed to record search analytics: {}", err);
    }
}

#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_suggestion_limit")]
    pub limit: usize,
}

fn default_suggestion_limit() -> usize {
    10
}

/// GET /api/suggestions - 输入联想
pub async fn suggestions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestionParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let query = params.q.trim();
    if query.is_empty() {
        return Ok(Json(json!({"suggestions": []})));
    }
    let limit = params.limit.clamp(1, 50);

    let prefix = format!("{}%", query);
    let anywhere = format!("%{}%", query);

    let product_names: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT name FROM products WHERE name LIKE ? OR name LIKE ? \
         ORDER BY name LIMIT ?",
    )
    .bind(&prefix)
    .bind(&anywhere)
    .bind(limit as i64)
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    let category_names: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT name FROM categories WHERE name LIKE ? OR name LIKE ? \
         ORDER BY name LIMIT 5",
    )
    .bind(&prefix)
    .bind(&anywhere)
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    let suggestions: Vec<Value> = product_names
        .into_iter()
        .map(|(text,)| json!({"type": "product", "text": text}))
        .chain(
            category_names
                .into_iter()
                .map(|(text,)| json!({"type": "category", "text": text})),
        )
        .take(limit)
        .collect();

    Ok(Json(json!({"suggestions": suggestions})))
}

/// GET /api/categories - 分类及产品数量
pub async fn categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let rows: Vec<(i64, String, i64)> = sqlx::query_as(
        "SELECT c.id, c.name, COUNT(p.id) AS product_count \
         FROM categories c LEFT JOIN products p ON c.id = p.category_id \
         GROUP BY c.id, c.name ORDER BY c.name",
    )
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    let categories: Vec<Value> = rows
        .into_iter()
        .map(|(id, name, product_count)| {
            json!({"id": id, "name": name, "product_count": product_count})
        })
        .collect();

    Ok(Json(json!({"categories": categories})))
}

/// GET /api/domains - 产品领域及产品数量
pub async fn domains(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let rows: Vec<(i64, String, i64)> = sqlx::query_as(
        "SELECT d.id, d.name, COUNT(p.id) AS product_count \
         FROM domains d LEFT JOIN products p ON d.id = p.domain_id \
         GROUP BY d.id, d.name ORDER BY d.name",
    )
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    let domains: Vec<Value> = rows
        .into_iter()
        .map(|(id, name, product_count)| {
            json!({"id": id, "name": name, "product_count": product_count})
        })
        .collect();

    Ok(Json(json!({"domains": domains})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_backend::models::Product;

    fn result(id: i64, name: &str, price: Option<f64>, created_at: &str, score: i64) -> ScoredResult {
        ScoredResult {
            product: Product {
                id,
                name: name.to_string(),
                description: "x".to_string(),
                price,
                currency: None,
                image_data: None,
                gallery_images: Vec::new(),
                product_url: None,
                rating: None,
                availability: None,
                category: None,
                domain: None,
                tags: Vec::new(),
                specifications: Vec::new(),
                features: Vec::new(),
                created_at: created_at.to_string(),
                updated_at: created_at.to_string(),
            },
            relevance_score: score,
            matched_fields: Vec::new(),
        }
    }

    #[test]
    fn test_apply_sort_price_puts_unpriced_last() {
        let mut results = vec![
            result(1, "B", None, "2024-01-01T00:00:00+00:00", 10),
            result(2, "A", Some(50.0), "2024-01-02T00:00:00+00:00", 20),
            result(3, "C", Some(10.0), "2024-01-03T00:00:00+00:00", 30),
        ];
        apply_sort(&mut results, SortBy::PriceAsc);
        let ids: Vec<i64> = results.iter().map(|r| r.product.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        apply_sort(&mut results, SortBy::PriceDesc);
        let ids: Vec<i64> = results.iter().map(|r| r.product.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_apply_sort_name_and_newest() {
        let mut results = vec![
            result(1, "B", None, "2024-01-01T00:00:00+00:00", 10),
            result(2, "A", None, "2024-01-02T00:00:00+00:00", 20),
        ];
        apply_sort(&mut results, SortBy::Name);
        assert_eq!(results[0].product.id, 2);

        apply_sort(&mut results, SortBy::Newest);
        assert_eq!(results[0].product.id, 2);

        // 相关性模式不重排，保持评分器给出的顺序
        let mut results = vec![
            result(1, "B", None, "2024-01-01T00:00:00+00:00", 30),
            result(2, "A", None, "2024-01-02T00:00:00+00:00", 20),
        ];
        apply_sort(&mut results, SortBy::Relevance);
        assert_eq!(results[0].product.id, 1);
    }

    #[test]
    fn test_cache_key_includes_filters() {
        let base = CatalogFilter::default();
        let narrowed = CatalogFilter {
            category: Some("racks".to_string()),
            ..Default::default()
        };
        assert_ne!(cache_key("smart", &base), cache_key("smart", &narrowed));
        assert_ne!(cache_key("smart", &base), cache_key("rack", &base));
        assert_eq!(cache_key("smart", &base), cache_key("smart", &base));
    }
}
