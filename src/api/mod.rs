pub mod analytics;
pub mod auth;
pub mod products;
pub mod search;
pub mod server;
pub mod upload;

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

/// 数据库错误统一转为500 / map database errors to one 500 response
pub(crate) fn db_error(err: sqlx::Error) -> (StatusCode, Json<Value>) {
    tracing::error!("database error: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Internal Server Error", "message": "database error"})),
    )
}

/// 目录装配错误统一转为500 / map catalog assembly errors to one 500 response
pub(crate) fn catalog_error(err: catalog_backend::catalog::CatalogError) -> (StatusCode, Json<Value>) {
    tracing::error!("catalog error: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Internal Server Error", "message": "catalog error"})),
    )
}

pub(crate) fn bad_request(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "Validation Error", "message": message})),
    )
}

pub(crate) fn not_found(what: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": format!("{} not found", what)})),
    )
}
