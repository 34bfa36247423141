use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single specification entry (name/value pair) / 产品规格条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    pub name: String,
    pub value: String,
}

/// Catalog product assembled from the relational rows / 完整的产品模型
///
/// `name` and `description` are always present (enforced by [`Product::validate`]
/// at the catalog boundary); everything else may be absent or empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub image_data: Option<String>,
    pub gallery_images: Vec<String>,
    pub product_url: Option<String>,
    pub rating: Option<f64>,
    pub availability: Option<String>,
    pub category: Option<String>,
    pub domain: Option<String>,
    pub tags: Vec<String>,
    pub specifications: Vec<Specification>,
    pub features: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Data-integrity error for malformed catalog rows / 产品数据完整性错误
#[derive(Debug, Error)]
pub enum InvalidProductError {
    #[error("product {0} has an empty name")]
    MissingName(i64),
    #[error("product {0} has an empty description")]
    MissingDescription(i64),
}

impl Product {
    /// Validate the required fields once, at the catalog boundary / 边界校验
    ///
    /// 评分循环内不再重复检查，无效记录在装配时被跳过。
    pub fn validate(&self) -> Result<(), InvalidProductError> {
        if self.name.trim().is_empty() {
            return Err(InvalidProductError::MissingName(self.id));
        }
        if self.description.trim().is_empty() {
            return Err(InvalidProductError::MissingDescription(self.id));
        }
        Ok(())
    }
}

/// Flat product row as selected from the database (joined with category/domain
/// names, before the child tables are attached) / 数据库产品行
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub image_data: Option<String>,
    pub gallery_images: Option<String>,
    pub product_url: Option<String>,
    pub rating: Option<f64>,
    pub availability: Option<String>,
    pub category_name: Option<String>,
    pub domain_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ProductRow {
    /// Attach the child rows and parse the gallery JSON / 装配为完整产品
    pub fn into_product(
        self,
        tags: Vec<String>,
        specifications: Vec<Specification>,
        features: Vec<String>,
    ) -> Product {
        let gallery_images = self
            .gallery_images
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .unwrap_or_default();

        Product {
            id: self.id,
            name: self.name,
            description: self.description,
            price: self.price,
            currency: self.currency,
            image_data: self.image_data,
            gallery_images,
            product_url: self.product_url,
            rating: self.rating,
            availability: self.availability,
            category: self.category_name,
            domain: self.domain_name,
            tags,
            specifications,
            features,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Pagination metadata returned by list/search endpoints / 分页元数据
#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

impl Pagination {
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        Self {
            page,
            limit,
            total,
            pages: total.div_ceil(limit.max(1)),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
    pub last_login: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Payload for creating a product / 创建产品请求
///
/// `name`/`description`/`price`/`currency` are required; the handler rejects
/// empty strings with a validation error.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub currency: String,
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub gallery_images: Option<Vec<String>>,
    #[serde(default)]
    pub product_url: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub specifications: Vec<Specification>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update: `None` leaves the field unchanged; for the child
/// collections `Some(..)` replaces the existing set / 部分更新请求
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub gallery_images: Option<Vec<String>>,
    #[serde(default)]
    pub product_url: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub specifications: Option<Vec<Specification>>,
    #[serde(default)]
    pub features: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Bulk import keeps the raw JSON values so one malformed entry fails
/// alone instead of rejecting the whole batch / 批量导入请求
#[derive(Debug, Deserialize)]
pub struct BulkImportRequest {
    pub products: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct BulkImportError {
    pub index: usize,
    pub product: String,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct BulkImportReport {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<BulkImportError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, description: &str) -> ProductRow {
        ProductRow {
            id: 1,
            name: name.to_string(),
            description: description.to_string(),
            price: None,
            currency: None,
            image_data: None,
            gallery_images: Some(r#"["a.jpg","b.jpg"]"#.to_string()),
            product_url: None,
            rating: None,
            availability: None,
            category_name: None,
            domain_name: None,
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
            updated_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_validate_required_fields() {
        let ok = row("Rack", "A rack").into_product(vec![], vec![], vec![]);
        assert!(ok.validate().is_ok());

        let no_name = row("  ", "A rack").into_product(vec![], vec![], vec![]);
        assert!(matches!(
            no_name.validate(),
            Err(InvalidProductError::MissingName(1))
        ));

        let no_desc = row("Rack", "").into_product(vec![], vec![], vec![]);
        assert!(matches!(
            no_desc.validate(),
            Err(InvalidProductError::MissingDescription(1))
        ));
    }

    #[test]
    fn test_gallery_json_parsing() {
        let product = row("Rack", "A rack").into_product(vec![], vec![], vec![]);
        assert_eq!(product.gallery_images, vec!["a.jpg", "b.jpg"]);

        let mut bad = row("Rack", "A rack");
        bad.gallery_images = Some("not json".to_string());
        let product = bad.into_product(vec![], vec![], vec![]);
        assert!(product.gallery_images.is_empty());
    }

    #[test]
    fn test_pagination_pages() {
        assert_eq!(Pagination::new(1, 20, 0).pages, 0);
        assert_eq!(Pagination::new(1, 20, 20).pages, 1);
        assert_eq!(Pagination::new(1, 20, 21).pages, 2);
    }
}
