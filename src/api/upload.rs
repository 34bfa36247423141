//! Product image upload endpoints / 产品图片上传接口
//!
//! Images are stored as base64 data URLs directly in the database, so the
//! size cap (config, default 2 MB) is deliberately tight.

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use base64::prelude::*;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::Cookies;

use catalog_backend::config;

use super::{bad_request, db_error, not_found};
use crate::auth::require_admin;
use crate::state::AppState;

const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
];

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ImageMeta {
    pub id: i64,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub uploaded_by: String,
    pub created_at: String,
}

/// POST /api/upload/image - 上传单张图片
///
/// Multipart fields: `image` (the file) and optional `productId`; when the
/// latter is present the product's `image_data` is updated as well.
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    cookies: Cookies,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let user = require_admin(&state.db, &headers, &cookies).await?;

    let mut image: Option<(String, String, Vec<u8>)> = None;
    let mut product_id: Option<i64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| bad_request("malformed multipart body"))?
    {
        let field_name = field.name().map(|name| name.to_string());
        match field_name.as_deref() {
            Some("image") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                // 客户端没报 content-type 就按文件名猜
                let content_type = field
                    .content_type()
                    .map(|mime| mime.to_string())
                    .unwrap_or_else(|| {
                        mime_guess::from_path(&filename)
                            .first_or_octet_stream()
                            .to_string()
                    });
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| bad_request("failed to read image data"))?
                    .to_vec();
                image = Some((filename, content_type, data));
            }
            Some("productId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| bad_request("failed to read productId"))?;
                product_id = text.trim().parse::<i64>().ok();
            }
            _ => {}
        }
    }

    let (filename, content_type, data) =
        image.ok_or_else(|| bad_request("No image file provided"))?;

    if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Invalid File Type",
                "message": "Only JPEG, PNG, WebP, and GIF images are allowed"
            })),
        ));
    }

    let max_size = config::config().upload.max_image_size_bytes();
    if data.len() > max_size {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "File Too Large",
                "message": format!(
                    "Image must be smaller than {} MB for database storage",
                    config::config().upload.max_image_size_mb
                )
            })),
        ));
    }

    let data_url = format!("data:{};base64,{}", content_type, BASE64_STANDARD.encode(&data));
    let now = Utc::now().to_rfc3339();

    let result = sqlx::query(
        "INSERT INTO product_images (filename, content_type, size, base64_data, uploaded_by, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&filename)
    .bind(&content_type)
    .bind(data.len() as i64)
    .bind(&data_url)
    .bind(&user.username)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(db_error)?;

    let image_id = result.last_insert_rowid();

    if let Some(product_id) = product_id {
        // 图片本身已入库，关联失败只告警
        let outcome = sqlx::query("UPDATE products SET image_data = ?, updated_at = ? WHERE id = ?")
            .bind(&data_url)
            .bind(&now)
            .bind(product_id)
            .execute(&state.db)
            .await;
        if let Err(err) = outcome {
            tracing::warn!("failed to attach image to product {}: {}", product_id, err);
        }
        state.search_cache.clear();
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "image": {
                "id": image_id,
                "filename": filename,
                "content_type": content_type,
                "size": data.len(),
            }
        })),
    ))
}

/// GET /api/upload/list - 图片元数据列表（不含图片内容）
pub async fn list_images(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    cookies: Cookies,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&state.db, &headers, &cookies).await?;

    let images: Vec<ImageMeta> = sqlx::query_as(
        "SELECT id, filename, content_type, size, uploaded_by, created_at \
         FROM product_images ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    Ok(Json(json!({"images": images})))
}

/// DELETE /api/upload/delete/:id
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    cookies: Cookies,
    Path(id): Path<i64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&state.db, &headers, &cookies).await?;

    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM product_images WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(db_error)?;
    if existing.is_none() {
        return Err(not_found("Image"));
    }

    sqlx::query("DELETE FROM product_images WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(db_error)?;

    Ok(Json(json!({"success": true, "message": "Image deleted successfully"})))
}
