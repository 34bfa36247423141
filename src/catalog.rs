//! Catalog provider - loads the scorable product snapshot / 产品目录装配
//!
//! The scorer never touches the database; it consumes the `Vec<Product>`
//! assembled here. Category/domain/price narrowing is a pre-search step
//! performed by this provider, not by the scorer.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::models::{Product, ProductRow, Specification};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Pre-search narrowing filters / 搜索前置过滤条件
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub category: Option<String>,
    pub domain: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn get_all_products(&self) -> Result<Vec<Product>, CatalogError>;

    async fn get_products_filtered(
        &self,
        filter: &CatalogFilter,
    ) -> Result<Vec<Product>, CatalogError>;
}

/// SQLite-backed catalog provider / 基于 SQLite 的目录提供者
pub struct DbCatalog {
    pool: SqlitePool,
}

impl DbCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogProvider for DbCatalog {
    async fn get_all_products(&self) -> Result<Vec<Product>, CatalogError> {
        self.get_products_filtered(&CatalogFilter::default()).await
    }

    async fn get_products_filtered(
        &self,
        filter: &CatalogFilter,
    ) -> Result<Vec<Product>, CatalogError> {
        let mut sql = String::from(
            "SELECT p.id, p.name, p.description, p.price, p.currency, p.image_data, \
             p.gallery_images, p.product_url, p.rating, p.availability, \
             c.name AS category_name, d.name AS domain_name, p.created_at, p.updated_at \
             FROM products p \
             LEFT JOIN categories c ON p.category_id = c.id \
             LEFT JOIN domains d ON p.domain_id = d.id \
             WHERE 1=1",
        );

        if filter.category.is_some() {
            sql.push_str(" AND c.name = ?");
        }
        if filter.domain.is_some() {
            sql.push_str(" AND d.name = ?");
        }
        if filter.min_price.is_some() {
            sql.push_str(" AND p.price >= ?");
        }
        if filter.max_price.is_some() {
            sql.push_str(" AND p.price <= ?");
        }
        // 按插入顺序返回，作为同分时的稳定顺序基准
        sql.push_str(" ORDER BY p.id");

        let mut query = sqlx::query_as::<_, ProductRow>(&sql);
        if let Some(ref category) = filter.category {
            query = query.bind(category);
        }
        if let Some(ref domain) = filter.domain {
            query = query.bind(domain);
        }
        if let Some(min_price) = filter.min_price {
            query = query.bind(min_price);
        }
        if let Some(max_price) = filter.max_price {
            query = query.bind(max_price);
        }

        let rows = query.fetch_all(&self.pool).await?;

        // 一次性取回所有子表再按 product_id 分组，避免逐产品查询
        let mut tags: HashMap<i64, Vec<String>> = HashMap::new();
        let tag_rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT product_id, tag_name FROM product_tags ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        for (product_id, tag) in tag_rows {
            tags.entry(product_id).or_default().push(tag);
        }

        let mut specifications: HashMap<i64, Vec<Specification>> = HashMap::new();
        let spec_rows: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT product_id, spec_name, spec_value FROM product_specifications ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        for (product_id, name, value) in spec_rows {
            specifications
                .entry(product_id)
                .or_default()
                .push(Specification { name, value });
        }

        let mut features: HashMap<i64, Vec<String>> = HashMap::new();
        let feature_rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT product_id, feature_name FROM product_features ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        for (product_id, feature) in feature_rows {
            features.entry(product_id).or_default().push(feature);
        }

        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            let product = row.into_product(
                tags.remove(&id).unwrap_or_default(),
                specifications.remove(&id).unwrap_or_default(),
                features.remove(&id).unwrap_or_default(),
            );
            // 边界校验：坏记录跳过并告警，绝不进入评分循环
            match product.validate() {
                Ok(()) => products.push(product),
                Err(err) => tracing::warn!("skipping invalid catalog row: {}", err),
            }
        }

        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        // 单连接，保证内存库在整个测试期间共享
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        pool
    }

    async fn insert_product(
        pool: &SqlitePool,
        name: &str,
        description: &str,
        price: f64,
        category: Option<&str>,
    ) -> i64 {
        let category_id = match category {
            Some(category) => {
                sqlx::query("INSERT OR IGNORE INTO categories (name) VALUES (?)")
                    .bind(category)
                    .execute(pool)
                    .await
                    .unwrap();
                let (id,): (i64,) = sqlx::query_as("SELECT id FROM categories WHERE name = ?")
                    .bind(category)
                    .fetch_one(pool)
                    .await
                    .unwrap();
                Some(id)
            }
            None => None,
        };

        let result = sqlx::query(
            "INSERT INTO products (name, description, price, currency, category_id, created_at, updated_at) \
             VALUES (?, ?, ?, 'USD', ?, '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00')",
        )
        .bind(name)
        .bind(description)
        .bind(price)
        .bind(category_id)
        .execute(pool)
        .await
        .unwrap();
        result.last_insert_rowid()
    }

    #[tokio::test]
    async fn test_assembles_child_rows() {
        let pool = test_pool().await;
        let id = insert_product(&pool, "Smart Rack", "42U rack", 999.0, Some("racks")).await;

        sqlx::query("INSERT INTO product_tags (product_id, tag_name) VALUES (?, 'smart')")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO product_specifications (product_id, spec_name, spec_value) \
             VALUES (?, 'height', '42U')",
        )
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO product_features (product_id, feature_name) VALUES (?, 'Monitoring')")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();

        let catalog = DbCatalog::new(pool);
        let products = catalog.get_all_products().await.unwrap();
        assert_eq!(products.len(), 1);

        let product = &products[0];
        assert_eq!(product.category.as_deref(), Some("racks"));
        assert_eq!(product.tags, vec!["smart"]);
        assert_eq!(product.specifications[0].name, "height");
        assert_eq!(product.features, vec!["Monitoring"]);
    }

    #[tokio::test]
    async fn test_filters_narrow_the_snapshot() {
        let pool = test_pool().await;
        insert_product(&pool, "Smart Rack", "42U rack", 999.0, Some("racks")).await;
        insert_product(&pool, "Duct Pipe", "HDPE duct", 25.0, Some("ducts")).await;

        let catalog = DbCatalog::new(pool);

        let filter = CatalogFilter {
            category: Some("racks".to_string()),
            ..Default::default()
        };
        let products = catalog.get_products_filtered(&filter).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Smart Rack");

        let filter = CatalogFilter {
            min_price: Some(100.0),
            ..Default::default()
        };
        let products = catalog.get_products_filtered(&filter).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Smart Rack");
    }

    #[tokio::test]
    async fn test_invalid_rows_are_skipped() {
        let pool = test_pool().await;
        insert_product(&pool, "Smart Rack", "42U rack", 999.0, None).await;
        insert_product(&pool, "", "orphan description", 1.0, None).await;

        let catalog = DbCatalog::new(pool);
        let products = catalog.get_all_products().await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Smart Rack");
    }
}
