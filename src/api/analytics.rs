//! Admin analytics endpoint / 管理端统计接口

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::Cookies;

use super::db_error;
use crate::auth::require_admin;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    30
}

/// GET /api/admin/analytics - 搜索与产品统计
pub async fn analytics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    cookies: Cookies,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&state.db, &headers, &cookies).await?;

    let days = params.days.clamp(1, 365);
    let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();
    let week_cutoff = (Utc::now() - Duration::days(7)).to_rfc3339();

    // 热门搜索词
    let top_searches: Vec<(String, i64, f64)> = sqlx::query_as(
        "SELECT query, COUNT(*) AS count, AVG(result_count) AS avg_results \
         FROM search_analytics \
         WHERE search_date >= ? AND query IS NOT NULL AND query != '' \
         GROUP BY query ORDER BY count DESC LIMIT 20",
    )
    .bind(&cutoff)
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    // 每日搜索趋势；取 RFC3339 的日期前缀，避免依赖 SQLite 的日期解析
    let search_trends: Vec<(String, i64)> = sqlx::query_as(
        "SELECT substr(search_date, 1, 10) AS date, COUNT(*) AS searches \
         FROM search_analytics WHERE search_date >= ? \
         GROUP BY substr(search_date, 1, 10) ORDER BY date DESC",
    )
    .bind(&cutoff)
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    // 分类热度
    let category_stats: Vec<(String, i64)> = sqlx::query_as(
        "SELECT category, COUNT(*) AS searches \
         FROM search_analytics \
         WHERE search_date >= ? AND category IS NOT NULL \
         GROUP BY category ORDER BY searches DESC LIMIT 10",
    )
    .bind(&cutoff)
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    // 产品概况
    let (total_products,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
        .fetch_one(&state.db)
        .await
        .map_err(db_error)?;
    let (new_this_week,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM products WHERE created_at >= ?")
            .bind(&week_cutoff)
            .fetch_one(&state.db)
            .await
            .map_err(db_error)?;
    let (updated_this_week,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM products WHERE updated_at >= ?")
            .bind(&week_cutoff)
            .fetch_one(&state.db)
            .await
            .map_err(db_error)?;

    Ok(Json(json!({
        "period_days": days,
        "top_searches": top_searches
            .into_iter()
            .map(|(query, count, avg_results)| json!({
                "query": query,
                "count": count,
                "avg_results": avg_results,
            }))
            .collect::<Vec<_>>(),
        "search_trends": search_trends
            .into_iter()
            .map(|(date, searches)| json!({"date": date, "searches": searches}))
            .collect::<Vec<_>>(),
        "category_stats": category_stats
            .into_iter()
            .map(|(category, searches)| json!({"category": category, "searches": searches}))
            .collect::<Vec<_>>(),
        "product_stats": {
            "total_products": total_products,
            "new_this_week": new_this_week,
            "updated_this_week": updated_this_week,
        }
    })))
}
