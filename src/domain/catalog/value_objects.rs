use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::ids::{CategoryId, ProductId};
use crate::validation::{self, Validate, ValidationError};

/// Free-form product attributes, e.g. `{"ram": "8GB", "color": "black"}`.
pub type Specifications = BTreeMap<String, serde_json::Value>;

// ============================================================================
// Category
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    /// Icon identifier understood by the front end.
    pub icon_name: String,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub icon_name: String,
    #[serde(default)]
    pub sort_order: i32,
}

impl Validate for NewCategory {
    fn validate(&self) -> Result<(), ValidationError> {
        validation::required("name", &self.name, 100)?;
        validation::optional_max_len("description", self.description.as_deref(), 500)?;
        validation::required("icon_name", &self.icon_name, 50)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon_name: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

impl Validate for CategoryUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validation::required("name", name, 100)?;
        }
        validation::optional_max_len("description", self.description.as_deref(), 500)?;
        if let Some(icon_name) = &self.icon_name {
            validation::required("icon_name", icon_name, 50)?;
        }
        Ok(())
    }
}

impl Category {
    pub fn apply(&mut self, update: CategoryUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(icon_name) = update.icon_name {
            self.icon_name = icon_name;
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        if let Some(sort_order) = update.sort_order {
            self.sort_order = sort_order;
        }
    }
}

// ============================================================================
// Product
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub sku: String,
    /// Kilograms, three decimal places.
    pub weight: Option<Decimal>,
    /// `{width, height, depth}` as supplied by the merchant.
    pub dimensions: Option<serde_json::Value>,
    #[sqlx(json)]
    pub specifications: Specifications,
    pub images: Vec<String>,
    pub rating: Option<Decimal>,
    pub review_count: i32,
    pub is_featured: bool,
    pub is_active: bool,
    pub category_id: CategoryId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    pub fn in_stock(&self, quantity: i32) -> bool {
        self.stock_quantity >= quantity
    }

    pub fn apply(&mut self, update: ProductUpdate, now: DateTime<Utc>) {
        let ProductUpdate {
            name,
            description,
            price,
            original_price,
            stock_quantity,
            brand,
            model,
            weight,
            dimensions,
            specifications,
            images,
            rating,
            review_count,
            is_featured,
            is_active,
            category_id,
        } = update;

        if let Some(v) = name {
            self.name = v;
        }
        if let Some(v) = description {
            self.description = v;
        }
        if let Some(v) = price {
            self.price = v;
        }
        if let Some(v) = original_price {
            self.original_price = Some(v);
        }
        if let Some(v) = stock_quantity {
            self.stock_quantity = v;
        }
        if let Some(v) = brand {
            self.brand = Some(v);
        }
        if let Some(v) = model {
            self.model = Some(v);
        }
        if let Some(v) = weight {
            self.weight = Some(v);
        }
        if let Some(v) = dimensions {
            self.dimensions = Some(v);
        }
        if let Some(v) = specifications {
            self.specifications = v;
        }
        if let Some(v) = images {
            self.images = v;
        }
        if let Some(v) = rating {
            self.rating = Some(v);
        }
        if let Some(v) = review_count {
            self.review_count = v;
        }
        if let Some(v) = is_featured {
            self.is_featured = v;
        }
        if let Some(v) = is_active {
            self.is_active = v;
        }
        if let Some(v) = category_id {
            self.category_id = v;
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub sku: String,
    pub weight: Option<Decimal>,
    pub dimensions: Option<serde_json::Value>,
    #[serde(default)]
    pub specifications: Specifications,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    pub category_id: CategoryId,
}

impl Validate for NewProduct {
    fn validate(&self) -> Result<(), ValidationError> {
        validation::required("name", &self.name, 200)?;
        validation::max_len("description", &self.description, 2000)?;
        validation::amount("price", self.price, 2)?;
        validation::optional_amount("original_price", self.original_price, 2)?;
        validation::non_negative("stock_quantity", self.stock_quantity)?;
        validation::optional_max_len("brand", self.brand.as_deref(), 100)?;
        validation::optional_max_len("model", self.model.as_deref(), 100)?;
        validation::required("sku", &self.sku, 100)?;
        validate_weight(self.weight)?;
        validate_dimensions(self.dimensions.as_ref())?;
        validate_images(&self.images)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub original_price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub weight: Option<Decimal>,
    pub dimensions: Option<serde_json::Value>,
    pub specifications: Option<Specifications>,
    pub images: Option<Vec<String>>,
    /// Average review score, 0 to 5.
    pub rating: Option<Decimal>,
    pub review_count: Option<i32>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
    pub category_id: Option<CategoryId>,
}

impl Validate for ProductUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validation::required("name", name, 200)?;
        }
        validation::optional_max_len("description", self.description.as_deref(), 2000)?;
        validation::optional_amount("price", self.price, 2)?;
        validation::optional_amount("original_price", self.original_price, 2)?;
        if let Some(stock) = self.stock_quantity {
            validation::non_negative("stock_quantity", stock)?;
        }
        validation::optional_max_len("brand", self.brand.as_deref(), 100)?;
        validation::optional_max_len("model", self.model.as_deref(), 100)?;
        validate_weight(self.weight)?;
        validate_dimensions(self.dimensions.as_ref())?;
        if let Some(images) = &self.images {
            validate_images(images)?;
        }
        if let Some(rating) = self.rating {
            validation::decimal_range("rating", rating, Decimal::ZERO, Decimal::new(5, 0))?;
            validation::amount("rating", rating, 2)?;
        }
        if let Some(count) = self.review_count {
            validation::non_negative("review_count", count)?;
        }
        Ok(())
    }
}

/// Largest weight a `NUMERIC(10, 3)` column holds.
const MAX_WEIGHT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 3);

fn validate_weight(weight: Option<Decimal>) -> Result<(), ValidationError> {
    if let Some(weight) = weight {
        validation::amount("weight", weight, 3)?;
        validation::decimal_range("weight", weight, Decimal::ZERO, MAX_WEIGHT)?;
    }
    Ok(())
}

fn validate_dimensions(dimensions: Option<&serde_json::Value>) -> Result<(), ValidationError> {
    match dimensions {
        Some(value) if !value.is_object() => Err(ValidationError::Invalid {
            field: "dimensions",
            reason: "must be an object".to_string(),
        }),
        _ => Ok(()),
    }
}

fn validate_images(images: &[String]) -> Result<(), ValidationError> {
    for url in images {
        validation::required("images", url, 500)?;
    }
    Ok(())
}

/// Listing filter. Not a search engine: exact matches only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    pub active_only: bool,
    pub featured_only: bool,
}

impl ProductFilter {
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    pub fn in_category(category_id: CategoryId) -> Self {
        Self {
            category_id: Some(category_id),
            active_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, product: &Product) -> bool {
        if self.active_only && !product.is_active {
            return false;
        }
        if self.featured_only && !product.is_featured {
            return false;
        }
        match self.category_id {
            Some(category_id) => product.category_id == category_id,
            None => true,
        }
    }
}

// ============================================================================
// Product Response - flattened read view with the category name denormalised
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub sku: String,
    pub weight: Option<Decimal>,
    pub dimensions: Option<serde_json::Value>,
    pub specifications: Specifications,
    pub images: Vec<String>,
    pub rating: Option<Decimal>,
    pub review_count: i32,
    pub is_featured: bool,
    pub is_active: bool,
    pub category_id: CategoryId,
    pub category_name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ProductResponse {
    pub fn from_parts(product: Product, category: &Category) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            original_price: product.original_price,
            stock_quantity: product.stock_quantity,
            brand: product.brand,
            model: product.model,
            sku: product.sku,
            weight: product.weight,
            dimensions: product.dimensions,
            specifications: product.specifications,
            images: product.images,
            rating: product.rating,
            review_count: product.review_count,
            is_featured: product.is_featured,
            is_active: product.is_active,
            category_id: product.category_id,
            category_name: category.name.clone(),
            created_at: product.created_at.to_rfc3339(),
            updated_at: product.updated_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_product() -> NewProduct {
        NewProduct {
            name: "Mechanical Keyboard".to_string(),
            description: "Hot-swappable, 75% layout".to_string(),
            price: dec!(89.90),
            original_price: Some(dec!(99.90)),
            stock_quantity: 12,
            brand: Some("Keyco".to_string()),
            model: Some("K75".to_string()),
            sku: "KB-K75-BLK".to_string(),
            weight: Some(dec!(0.875)),
            dimensions: Some(serde_json::json!({"width": 32, "height": 4, "depth": 14})),
            specifications: Specifications::from([(
                "switch".to_string(),
                serde_json::json!("brown"),
            )]),
            images: vec!["https://cdn.example.com/k75.png".to_string()],
            is_featured: false,
            category_id: CategoryId::new(1),
        }
    }

    #[test]
    fn test_new_product_validation() {
        assert!(new_product().validate().is_ok());

        let negative_price = NewProduct {
            price: dec!(-1),
            ..new_product()
        };
        assert_eq!(
            negative_price.validate(),
            Err(ValidationError::Negative { field: "price" })
        );

        let negative_stock = NewProduct {
            stock_quantity: -1,
            ..new_product()
        };
        assert_eq!(
            negative_stock.validate(),
            Err(ValidationError::Negative {
                field: "stock_quantity"
            })
        );

        let precise_weight = NewProduct {
            weight: Some(dec!(0.8755)),
            ..new_product()
        };
        assert!(precise_weight.validate().is_err());

        let bad_dimensions = NewProduct {
            dimensions: Some(serde_json::json!([1, 2, 3])),
            ..new_product()
        };
        assert!(bad_dimensions.validate().is_err());
    }

    #[test]
    fn test_review_fields_validation() {
        let rated = ProductUpdate {
            rating: Some(dec!(4.75)),
            review_count: Some(12),
            ..ProductUpdate::default()
        };
        assert!(rated.validate().is_ok());

        let too_high = ProductUpdate {
            rating: Some(dec!(5.01)),
            ..ProductUpdate::default()
        };
        assert!(matches!(
            too_high.validate(),
            Err(ValidationError::OutOfRange { field: "rating", .. })
        ));

        let too_precise = ProductUpdate {
            rating: Some(dec!(4.125)),
            ..ProductUpdate::default()
        };
        assert!(too_precise.validate().is_err());

        let negative_count = ProductUpdate {
            review_count: Some(-1),
            ..ProductUpdate::default()
        };
        assert_eq!(
            negative_count.validate(),
            Err(ValidationError::Negative {
                field: "review_count"
            })
        );
    }

    #[test]
    fn test_weight_fits_column() {
        assert_eq!(MAX_WEIGHT, dec!(9999999.999));
        assert!(validate_weight(Some(dec!(0.875))).is_ok());
        assert!(validate_weight(Some(dec!(9999999.999))).is_ok());
        assert!(matches!(
            validate_weight(Some(dec!(10000000))),
            Err(ValidationError::OutOfRange { field: "weight", .. })
        ));
        assert!(matches!(
            validate_weight(Some(dec!(0.0001))),
            Err(ValidationError::TooPrecise { field: "weight", places: 3 })
        ));
    }

    #[test]
    fn test_price_above_column_size_rejected() {
        let huge = NewProduct {
            price: dec!(100000000000000000000.00),
            ..new_product()
        };
        assert!(matches!(
            huge.validate(),
            Err(ValidationError::OutOfRange { field: "price", .. })
        ));
    }

    #[test]
    fn test_category_validation() {
        let category = NewCategory {
            name: "Electronics".to_string(),
            description: None,
            icon_name: "cpu".to_string(),
            sort_order: 0,
        };
        assert!(category.validate().is_ok());

        let long_icon = NewCategory {
            icon_name: "x".repeat(51),
            ..category
        };
        assert!(long_icon.validate().is_err());
    }

    #[test]
    fn test_filter_matches() {
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(1),
            name: "Lamp".to_string(),
            description: String::new(),
            price: dec!(10),
            original_price: None,
            stock_quantity: 1,
            brand: None,
            model: None,
            sku: "LAMP".to_string(),
            weight: None,
            dimensions: None,
            specifications: Specifications::new(),
            images: vec![],
            rating: None,
            review_count: 0,
            is_featured: false,
            is_active: true,
            category_id: CategoryId::new(2),
            created_at: now,
            updated_at: now,
        };

        assert!(ProductFilter::default().matches(&product));
        assert!(ProductFilter::in_category(CategoryId::new(2)).matches(&product));
        assert!(!ProductFilter::in_category(CategoryId::new(3)).matches(&product));
        assert!(!ProductFilter {
            featured_only: true,
            ..ProductFilter::default()
        }
        .matches(&product));

        let inactive = Product {
            is_active: false,
            ..product
        };
        assert!(!ProductFilter::active().matches(&inactive));
    }
}
