use thiserror::Error;

use stockledger_core::DomainError;

use crate::store::StoreError;

/// Classified error returned by the ledger, catalog and query services.
///
/// Storage codes never cross this boundary: [`StoreError`] and [`DomainError`]
/// are translated by the `From` impls below.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate sku/barcode, or concurrent-write retries exhausted.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid movement: {0}")]
    InvalidMovement(String),

    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("validation error: {0}")]
    Validation(String),

    /// The store was unavailable or timed out; nothing was written, the call may be retried.
    #[error("transient failure, retry: {0}")]
    Transient(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

pub type InventoryResult<T> = Result<T, InventoryError>;

impl InventoryError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Whether the caller may safely retry the same request.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<DomainError> for InventoryError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            DomainError::InvalidMovement(msg) => Self::InvalidMovement(msg),
            DomainError::InsufficientStock {
                available,
                requested,
            } => Self::InsufficientStock {
                available,
                requested,
            },
            DomainError::NotFound => Self::NotFound("product".to_string()),
            DomainError::Conflict(msg) => Self::Conflict(msg),
        }
    }
}

impl From<StoreError> for InventoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::UniqueViolation(what) => Self::Conflict(format!("duplicate {what}")),
            StoreError::Concurrency(msg) => Self::Conflict(msg),
            StoreError::Unavailable(msg) => Self::Transient(msg),
            StoreError::Backend(msg) => Self::Storage(msg),
        }
    }
}
