// ============================================================================
// Error Taxonomy
// ============================================================================
//
// Each domain keeps its own error enum (CatalogError, OrderError, ...). They
// all classify into the same small set of kinds so a front end can map them
// to responses without matching on every variant.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A field constraint was violated.
    Validation,
    /// A referenced id does not exist.
    NotFound,
    /// Stock unavailable, duplicate unique key, stale read, illegal transition.
    Conflict,
    /// The operation is not valid for the entity's current state.
    State,
    /// Storage or collaborator failure.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::State => "state",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every domain error.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl Classify for crate::validation::ValidationError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

impl Classify for crate::store::StoreError {
    fn kind(&self) -> ErrorKind {
        use crate::store::StoreError;
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Duplicate { .. } => ErrorKind::Conflict,
            _ => ErrorKind::Internal,
        }
    }
}
