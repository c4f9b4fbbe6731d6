use crate::domain::ids::{AddressId, UserId};
use crate::errors::{Classify, ErrorKind};
use crate::store::StoreError;
use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("Address not found: {0}")]
    NotFound(AddressId),

    #[error("User not found: {0}")]
    UnknownUser(UserId),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for AddressError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::UnknownUser(_) => ErrorKind::NotFound,
            Self::Validation(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }
}
