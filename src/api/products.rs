//! Product CRUD endpoints / 产品增删改查接口
//!
//! Listing and single-product reads are public; every mutation requires an
//! admin session and clears the search result cache.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::Cookies;

use catalog_backend::models::{
    BulkImportError, BulkImportReport, BulkImportRequest, CreateProductRequest, Pagination,
    Product, ProductRow, UpdateProductRequest,
};

use super::{bad_request, db_error, not_found};
use crate::auth::require_admin;
use crate::state::AppState;

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, p.price, p.currency, p.image_data, \
     p.gallery_images, p.product_url, p.rating, p.availability, \
     c.name AS category_name, d.name AS domain_name, p.created_at, p.updated_at";

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    domain: Option<String>,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    20
}

/// GET /api/products - 分页产品列表（公开）
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProductListQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);
    let offset = (page - 1) * limit;
    let category = params.category.filter(|c| !c.is_empty());
    let domain = params.domain.filter(|d| !d.is_empty());

    let mut sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p \
         LEFT JOIN categories c ON p.category_id = c.id \
         LEFT JOIN domains d ON p.domain_id = d.id WHERE 1=1"
    );
    let mut count_sql = String::from(
        "SELECT COUNT(*) FROM products p \
         LEFT JOIN categories c ON p.category_id = c.id \
         LEFT JOIN domains d ON p.domain_id = d.id WHERE 1=1",
    );
    if category.is_some() {
        sql.push_str(" AND c.name = ?");
        count_sql.push_str(" AND c.name = ?");
    }
    if domain.is_some() {
        sql.push_str(" AND d.name = ?");
        count_sql.push_str(" AND d.name = ?");
    }
    sql.push_str(" ORDER BY p.created_at DESC LIMIT ? OFFSET ?");

    let mut query = sqlx::query_as::<_, ProductRow>(&sql);
    let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
    if let Some(ref category) = category {
        query = query.bind(category);
        count_query = count_query.bind(category);
    }
    if let Some(ref domain) = domain {
        query = query.bind(domain);
        count_query = count_query.bind(domain);
    }
    query = query.bind(limit as i64).bind(offset as i64);

    let products = query.fetch_all(&state.db).await.map_err(db_error)?;
    let (total,) = count_query.fetch_one(&state.db).await.map_err(db_error)?;

    Ok(Json(json!({
        "products": products,
        "pagination": Pagination::new(page, limit, total as usize),
    })))
}

/// GET /api/products/:id - 单个产品详情（公开）
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Product>, (StatusCode, Json<Value>)> {
    match fetch_product(&state, id).await.map_err(db_error)? {
        Some(product) => Ok(Json(product)),
        None => Err(not_found("Product")),
    }
}

/// Load one product with its child rows / 读取完整产品
pub(crate) async fn fetch_product(
    state: &AppState,
    id: i64,
) -> Result<Option<Product>, sqlx::Error> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p \
         LEFT JOIN categories c ON p.category_id = c.id \
         LEFT JOIN domains d ON p.domain_id = d.id WHERE p.id = ?"
    );
    let row: Option<ProductRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&state.db)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let tags: Vec<(String,)> =
        sqlx::query_as("SELECT tag_name FROM product_tags WHERE product_id = ? ORDER BY tag_name")
            .bind(id)
            .fetch_all(&state.db)
            .await?;
    let specifications: Vec<(String, String)> = sqlx::query_as(
        "SELECT spec_name, spec_value FROM product_specifications \
         WHERE product_id = ? ORDER BY spec_name",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;
    let features: Vec<(String,)> = sqlx::query_as(
        "SELECT feature_name FROM product_features WHERE product_id = ? ORDER BY feature_name",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    Ok(Some(row.into_product(
        tags.into_iter().map(|(tag,)| tag).collect(),
        specifications
            .into_iter()
            .map(|(name, value)| catalog_backend::models::Specification { name, value })
            .collect(),
        features.into_iter().map(|(feature,)| feature).collect(),
    )))
}

async fn get_or_create_category(state: &AppState, name: &str) -> Result<i64, sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO categories (name) VALUES (?)")
        .bind(name)
        .execute(&state.db)
        .await?;
    let (id,): (i64,) = sqlx::query_as("SELECT id FROM categories WHERE name = ?")
        .bind(name)
        .fetch_one(&state.db)
        .await?;
    Ok(id)
}

async fn get_or_create_domain(state: &AppState, name: &str) -> Result<i64, sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO domains (name) VALUES (?)")
        .bind(name)
        .execute(&state.db)
        .await?;
    let (id,): (i64,) = sqlx::query_as("SELECT id FROM domains WHERE name = ?")
        .bind(name)
        .fetch_one(&state.db)
        .await?;
    Ok(id)
}

/// Insert one product with its child rows, returning the new id
/// 插入产品及其子表，返回新 id
async fn insert_product(
    state: &AppState,
    req: &CreateProductRequest,
) -> Result<i64, (StatusCode, Json<Value>)> {
    if req.name.trim().is_empty() {
        return Err(bad_request("name is required"));
    }
    if req.description.trim().is_empty() {
        return Err(bad_request("description is required"));
    }
    if req.currency.trim().is_empty() {
        return Err(bad_request("currency is required"));
    }

    let category_id = match req.category.as_deref().filter(|c| !c.is_empty()) {
        Some(name) => Some(get_or_create_category(state, name).await.map_err(db_error)?),
        None => None,
    };
    let domain_id = match req.domain.as_deref().filter(|d| !d.is_empty()) {
        Some(name) => Some(get_or_create_domain(state, name).await.map_err(db_error)?),
        None => None,
    };

    let gallery_json = req
        .gallery_images
        .as_ref()
        .and_then(|images| serde_json::to_string(images).ok());
    let now = Utc::now().to_rfc3339();

    let result = sqlx::query(
        "INSERT INTO products (name, description, price, currency, image_data, gallery_images, \
         product_url, rating, availability, category_id, domain_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.price)
    .bind(&req.currency)
    .bind(&req.image_data)
    .bind(&gallery_json)
    .bind(&req.product_url)
    .bind(req.rating)
    .bind(&req.availability)
    .bind(category_id)
    .bind(domain_id)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(db_error)?;

    let product_id = result.last_insert_rowid();

    for spec in &req.specifications {
        if spec.name.is_empty() || spec.value.is_empty() {
            continue;
        }
        sqlx::query(
            "INSERT INTO product_specifications (product_id, spec_name, spec_value) VALUES (?, ?, ?)",
        )
        .bind(product_id)
        .bind(&spec.name)
        .bind(&spec.value)
        .execute(&state.db)
        .await
        .map_err(db_error)?;
    }

    for feature in &req.features {
        if feature.is_empty() {
            continue;
        }
        sqlx::query("INSERT INTO product_features (product_id, feature_name) VALUES (?, ?)")
            .bind(product_id)
            .bind(feature)
            .execute(&state.db)
            .await
            .map_err(db_error)?;
    }

    for tag in &req.tags {
        if tag.is_empty() {
            continue;
        }
        sqlx::query("INSERT INTO product_tags (product_id, tag_name) VALUES (?, ?)")
            .bind(product_id)
            .bind(tag)
            .execute(&state.db)
            .await
            .map_err(db_error)?;
    }

    Ok(product_id)
}

/// POST /api/admin/products - 创建产品
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    cookies: Cookies,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    require_admin(&state.db, &headers, &cookies).await?;

    let product_id = insert_product(&state, &req).await?;
    state.search_cache.clear();

    let product = fetch_product(&state, product_id).await.map_err(db_error)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "product": product,
            "message": "Product created successfully"
        })),
    ))
}

/// PUT /api/admin/products/:id - 更新产品
///
/// `None` fields stay untouched; specifications/features/tags replace the
/// existing sets when present.
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    cookies: Cookies,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&state.db, &headers, &cookies).await?;

    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(db_error)?;
    if existing.is_none() {
        return Err(not_found("Product"));
    }

    if req.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(bad_request("name must not be empty"));
    }
    if req
        .description
        .as_deref()
        .is_some_and(|description| description.trim().is_empty())
    {
        return Err(bad_request("description must not be empty"));
    }

    let category_id = match req.category.as_deref().filter(|c| !c.is_empty()) {
        Some(name) => Some(get_or_create_category(&state, name).await.map_err(db_error)?),
        None => None,
    };
    let domain_id = match req.domain.as_deref().filter(|d| !d.is_empty()) {
        Some(name) => Some(get_or_create_domain(&state, name).await.map_err(db_error)?),
        None => None,
    };
    let gallery_json = req
        .gallery_images
        .as_ref()
        .and_then(|images| serde_json::to_string(images).ok());

    // 动态拼接 SET 子句，绑定顺序必须与 push 顺序一致
    let mut sets: Vec<&'static str> = Vec::new();
    if req.name.is_some() {
        sets.push("name = ?");
    }
    if req.description.is_some() {
        sets.push("description = ?");
    }
    if req.price.is_some() {
        sets.push("price = ?");
    }
    if req.currency.is_some() {
        sets.push("currency = ?");
    }
    if req.image_data.is_some() {
        sets.push("image_data = ?");
    }
    if gallery_json.is_some() {
        sets.push("gallery_images = ?");
    }
    if req.product_url.is_some() {
        sets.push("product_url = ?");
    }
    if req.rating.is_some() {
        sets.push("rating = ?");
    }
    if req.availability.is_some() {
        sets.push("availability = ?");
    }
    if category_id.is_some() {
        sets.push("category_id = ?");
    }
    if domain_id.is_some() {
        sets.push("domain_id = ?");
    }

    if !sets.is_empty() {
        sets.push("updated_at = ?");
        let sql = format!("UPDATE products SET {} WHERE id = ?", sets.join(", "));
        let mut query = sqlx::query(&sql);
        if let Some(ref name) = req.name {
            query = query.bind(name);
        }
        if let Some(ref description) = req.description {
            query = query.bind(description);
        }
        if let Some(price) = req.price {
            query = query.bind(price);
        }
        if let Some(ref currency) = req.currency {
            query = query.bind(currency);
        }
        if let Some(ref image_data) = req.image_data {
            query = query.bind(image_data);
        }
        if let Some(ref gallery) = gallery_json {
            query = query.bind(gallery);
        }
        if let Some(ref product_url) = req.product_url {
            query = query.bind(product_url);
        }
        if let Some(rating) = req.rating {
            query = query.bind(rating);
        }
        if let Some(ref availability) = req.availability {
            query = query.bind(availability);
        }
        if let Some(category_id) = category_id {
            query = query.bind(category_id);
        }
        if let Some(domain_id) = domain_id {
            query = query.bind(domain_id);
        }
        query = query.bind(Utc::now().to_rfc3339()).bind(id);
        query.execute(&state.db).await.map_err(db_error)?;
    }

    if let Some(ref specifications) = req.specifications {
        sqlx::query("DELETE FROM product_specifications WHERE product_id = ?")
            .bind(id)
            .execute(&state.db)
            .await
            .map_err(db_error)?;
        for spec in specifications {
            if spec.name.is_empty() || spec.value.is_empty() {
                continue;
            }
            sqlx::query(
                "INSERT INTO product_specifications (product_id, spec_name, spec_value) \
                 VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(&spec.name)
            .bind(&spec.value)
            .execute(&state.db)
            .await
            .map_err(db_error)?;
        }
    }

    if let Some(ref features) = req.features {
        sqlx::query("DELETE FROM product_features WHERE product_id = ?")
            .bind(id)
            .execute(&state.db)
            .await
            .map_err(db_error)?;
        for feature in features {
            if feature.is_empty() {
                continue;
            }
            sqlx::query("INSERT INTO product_features (product_id, feature_name) VALUES (?, ?)")
                .bind(id)
                .bind(feature)
                .execute(&state.db)
                .await
                .map_err(db_error)?;
        }
    }

    if let Some(ref tags) = req.tags {
        sqlx::query("DELETE FROM product_tags WHERE product_id = ?")
            .bind(id)
            .execute(&state.db)
            .await
            .map_err(db_error)?;
        for tag in tags {
            if tag.is_empty() {
                continue;
            }
            sqlx::query("INSERT INTO product_tags (product_id, tag_name) VALUES (?, ?)")
                .bind(id)
                .bind(tag)
                .execute(&state.db)
                .await
                .map_err(db_error)?;
        }
    }

    state.search_cache.clear();

    Ok(Json(json!({"success": true, "message": "Product updated successfully"})))
}

/// DELETE /api/admin/products/:id - 删除产品及其子表
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    cookies: Cookies,
    Path(id): Path<i64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&state.db, &headers, &cookies).await?;

    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(db_error)?;
    if existing.is_none() {
        return Err(not_found("Product"));
    }

    for statement in [
        "DELETE FROM product_specifications WHERE product_id = ?",
        "DELETE FROM product_features WHERE product_id = ?",
        "DELETE FROM product_tags WHERE product_id = ?",
        "DELETE FROM products WHERE id = ?",
    ] {
        sqlx::query(statement)
            .bind(id)
            .execute(&state.db)
            .await
            .map_err(db_error)?;
    }

    state.search_cache.clear();

    Ok(Json(json!({"success": true, "message": "Product deleted successfully"})))
}

/// POST /api/admin/products/bulk - 批量导入
///
/// Items fail individually; one malformed entry never aborts the batch.
pub async fn bulk_import(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    cookies: Cookies,
    Json(req): Json<BulkImportRequest>,
) -> Result<Json<BulkImportReport>, (StatusCode, Json<Value>)> {
    require_admin(&state.db, &headers, &cookies).await?;

    let mut report = BulkImportReport::default();

    for (index, raw) in req.products.into_iter().enumerate() {
        let product_name = raw
            .get("name")
            .and_then(|name| name.as_str())
            .unwrap_or("Unknown")
            .to_string();

        let parsed: Result<CreateProductRequest, _> = serde_json::from_value(raw);
        let outcome = match parsed {
            Ok(item) => insert_product(&state, &item)
                .await
                .map(|_| ())
                .map_err(|(_, body)| {
                    body.0
                        .get("message")
                        .and_then(|message| message.as_str())
                        .unwrap_or("insert failed")
                        .to_string()
                }),
            Err(err) => Err(err.to_string()),
        };

        match outcome {
            Ok(()) => report.success += 1,
            Err(error) => {
                report.failed += 1;
                report.errors.push(BulkImportError {
                    index,
                    product: product_name,
                    error,
                });
            }
        }
    }

    state.search_cache.clear();

    Ok(Json(report))
}
