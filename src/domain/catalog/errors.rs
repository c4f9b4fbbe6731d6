use crate::domain::ids::{CategoryId, ProductId};
use crate::errors::{Classify, ErrorKind};
use crate::store::StoreError;
use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Category not found: {0}")]
    CategoryNotFound(CategoryId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Category name already exists: {0}")]
    DuplicateCategoryName(String),

    #[error("SKU already exists: {0}")]
    DuplicateSku(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for CatalogError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::CategoryNotFound(_) | Self::ProductNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateCategoryName(_) | Self::DuplicateSku(_) => ErrorKind::Conflict,
            Self::Validation(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }
}
