use crate::domain::ids::ProductId;
use crate::errors::{Classify, ErrorKind};
use crate::store::StoreError;
use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Product is not available for sale: {0}")]
    ProductInactive(ProductId),

    #[error("Product {0} is not in the cart")]
    ItemNotInCart(ProductId),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for CartError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::ProductNotFound(_) | Self::ItemNotInCart(_) => ErrorKind::NotFound,
            Self::ProductInactive(_) => ErrorKind::State,
            Self::Validation(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }
}
