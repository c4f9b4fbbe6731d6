use std::sync::Arc;

use crate::clock::Clock;
use crate::domain::ids::{CategoryId, ProductId};
use crate::store::{constraints, Store, StoreError};
use crate::validation::Validate;

use super::errors::CatalogError;
use super::value_objects::*;

// ============================================================================
// Catalog Service
// ============================================================================

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(&self, input: NewCategory) -> Result<Category, CatalogError> {
        input.validate()?;
        let name = input.name.clone();

        let category = self
            .store
            .insert_category(input, self.clock.now())
            .await
            .map_err(|e| duplicate_name(e, &name))?;

        tracing::info!(category_id = %category.id, "Category created");
        Ok(category)
    }

    pub async fn get_category(&self, id: CategoryId) -> Result<Category, CatalogError> {
        self.store
            .get_category(id)
            .await?
            .ok_or(CatalogError::CategoryNotFound(id))
    }

    pub async fn update_category(
        &self,
        id: CategoryId,
        update: CategoryUpdate,
    ) -> Result<Category, CatalogError> {
        update.validate()?;
        let mut category = self.get_category(id).await?;
        category.apply(update);

        self.store
            .save_category(&category)
            .await
            .map_err(|e| duplicate_name(e, &category.name))?;
        Ok(category)
    }

    pub async fn list_categories(&self, active_only: bool) -> Result<Vec<Category>, CatalogError> {
        Ok(self.store.list_categories(active_only).await?)
    }

    pub async fn deactivate_category(&self, id: CategoryId) -> Result<Category, CatalogError> {
        self.update_category(
            id,
            CategoryUpdate {
                is_active: Some(false),
                ..CategoryUpdate::default()
            },
        )
        .await
    }

    #[tracing::instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create_product(&self, input: NewProduct) -> Result<Product, CatalogError> {
        input.validate()?;
        self.get_category(input.category_id).await?;
        let sku = input.sku.clone();

        let product = self
            .store
            .insert_product(input, self.clock.now())
            .await
            .map_err(|e| duplicate_sku(e, &sku))?;

        tracing::info!(
            product_id = %product.id,
            stock = product.stock_quantity,
            "Product created"
        );
        Ok(product)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.store
            .get_product(id)
            .await?
            .ok_or(CatalogError::ProductNotFound(id))
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, CatalogError> {
        update.validate()?;
        if let Some(category_id) = update.category_id {
            self.get_category(category_id).await?;
        }

        let now = self.clock.now();
        let stock = update.stock_quantity;

        // Locked read so a concurrent checkout or cancel cannot be overwritten.
        let mut tx = self.store.begin().await?;
        let mut product = tx
            .lock_products(&[id])
            .await?
            .pop()
            .ok_or(CatalogError::ProductNotFound(id))?;
        product.apply(update, now);

        tx.save_product(&product).await?;
        if let Some(quantity) = stock {
            tx.set_stock(id, quantity, now).await?;
        }
        tx.commit().await?;

        tracing::debug!(product_id = %id, stock = product.stock_quantity, "Product updated");
        Ok(product)
    }

    pub async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, CatalogError> {
        Ok(self.store.list_products(filter).await?)
    }

    /// Soft delete. Historical order items keep their snapshot either way.
    pub async fn deactivate_product(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.update_product(
            id,
            ProductUpdate {
                is_active: Some(false),
                ..ProductUpdate::default()
            },
        )
        .await
    }

    pub async fn product_response(&self, id: ProductId) -> Result<ProductResponse, CatalogError> {
        let product = self.get_product(id).await?;
        let category = self.get_category(product.category_id).await?;
        Ok(ProductResponse::from_parts(product, &category))
    }
}

fn duplicate_name(err: StoreError, name: &str) -> CatalogError {
    if err.is_duplicate(constraints::CATEGORY_NAME) {
        CatalogError::DuplicateCategoryName(name.to_string())
    } else {
        err.into()
    }
}

fn duplicate_sku(err: StoreError, sku: &str) -> CatalogError {
    if err.is_duplicate(constraints::PRODUCT_SKU) {
        CatalogError::DuplicateSku(sku.to_string())
    } else {
        err.into()
    }
}
