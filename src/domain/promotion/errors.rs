use crate::domain::ids::BannerId;
use crate::errors::{Classify, ErrorKind};
use crate::store::StoreError;
use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum PromotionError {
    #[error("Banner not found: {0}")]
    BannerNotFound(BannerId),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for PromotionError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::BannerNotFound(_) => ErrorKind::NotFound,
            Self::Validation(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }
}
