use std::sync::Arc;

use crate::clock::Clock;
use crate::domain::catalog::Product;
use crate::domain::ids::{ProductId, UserId};
use crate::store::Store;
use crate::validation;

use super::errors::CartError;
use super::value_objects::*;

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Add `quantity` units, merging into an existing line additively.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem, CartError> {
        validation::quantity(quantity)?;
        self.sellable_product(product_id).await?;

        let item = self
            .store
            .upsert_cart_item(user_id, product_id, quantity, CartWrite::Add, self.clock.now())
            .await?;

        tracing::debug!(quantity = item.quantity, "Cart line updated");
        Ok(item)
    }

    /// Set the quantity of a line already in the cart.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem, CartError> {
        validation::quantity(quantity)?;
        let in_cart = self
            .store
            .cart_items(user_id)
            .await?
            .iter()
            .any(|item| item.product_id == product_id);
        if !in_cart {
            return Err(CartError::ItemNotInCart(product_id));
        }
        self.sellable_product(product_id).await?;

        Ok(self
            .store
            .upsert_cart_item(user_id, product_id, quantity, CartWrite::Replace, self.clock.now())
            .await?)
    }

    pub async fn remove_item(&self, user_id: UserId, product_id: ProductId) -> Result<(), CartError> {
        if !self.store.remove_cart_item(user_id, product_id).await? {
            return Err(CartError::ItemNotInCart(product_id));
        }
        Ok(())
    }

    pub async fn clear(&self, user_id: UserId) -> Result<u64, CartError> {
        let removed = self.store.clear_cart(user_id).await?;
        tracing::debug!(user_id = %user_id, removed, "Cart cleared");
        Ok(removed)
    }

    pub async fn items(&self, user_id: UserId) -> Result<Vec<CartItem>, CartError> {
        Ok(self.store.cart_items(user_id).await?)
    }

    /// Cart contents priced at current catalog prices.
    pub async fn summary(&self, user_id: UserId) -> Result<CartSummary, CartError> {
        let items = self.store.cart_items(user_id).await?;
        let mut lines = Vec::with_capacity(items.len());

        for item in &items {
            match self.store.get_product(item.product_id).await? {
                Some(product) => lines.push(CartSummaryLine::new(item, &product)),
                None => tracing::warn!(
                    product_id = %item.product_id,
                    "Cart references a missing product, skipping line"
                ),
            }
        }

        Ok(CartSummary::from_lines(lines))
    }

    async fn sellable_product(&self, product_id: ProductId) -> Result<Product, CartError> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;
        if !product.is_active {
            return Err(CartError::ProductInactive(product_id));
        }
        Ok(product)
    }
}
