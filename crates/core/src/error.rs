//! Domain error model.

use thiserror::Error;

use crate::id::VariantId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every failure raised by the ledger, the order components, or the storage
/// boundary ends up here. The request layer turns it into a response envelope
/// through [`DomainError::kind`]; the core never formats responses itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input (non-positive quantity, missing fields).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A deduction would drive the derived balance below zero.
    #[error("insufficient stock for variant {variant_id}: available {available}, requested {requested}")]
    InsufficientStock {
        variant_id: VariantId,
        available: i64,
        requested: i64,
    },

    /// The operation is not allowed from the document's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The referenced document is absent or owned by another business.
    #[error("{0} not found")]
    NotFound(String),

    /// The policy denied the action for the caller's role.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A concurrent writer changed the document first (stale version).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The storage layer failed (connection, serialization, ...).
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn insufficient_stock(variant_id: VariantId, available: i64, requested: i64) -> Self {
        Self::InsufficientStock {
            variant_id,
            available,
            requested,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_) | DomainError::InvalidId(_) => ErrorKind::Validation,
            DomainError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            DomainError::InvalidState(_) => ErrorKind::InvalidState,
            DomainError::NotFound(_) => ErrorKind::NotFound,
            DomainError::Forbidden(_) => ErrorKind::Forbidden,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Stable classification of a [`DomainError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    InsufficientStock,
    InvalidState,
    NotFound,
    Forbidden,
    Conflict,
    Storage,
}

impl ErrorKind {
    /// Machine-readable code used in response envelopes and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Storage => "storage_error",
        }
    }

    /// Suggested HTTP status code.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::InvalidState | ErrorKind::Conflict => 409,
            ErrorKind::InsufficientStock => 422,
            ErrorKind::Storage => 500,
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_distinct_code() {
        let kinds = [
            ErrorKind::Validation,
            ErrorKind::InsufficientStock,
            ErrorKind::InvalidState,
            ErrorKind::NotFound,
            ErrorKind::Forbidden,
            ErrorKind::Conflict,
            ErrorKind::Storage,
        ];
        let mut codes: Vec<_> = kinds.iter().map(|k| k.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn insufficient_stock_maps_to_unprocessable() {
        let err = DomainError::insufficient_stock(VariantId::new(), 3, 5);
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(err.kind().status_code(), 422);
        assert!(err.to_string().contains("available 3, requested 5"));
    }

    #[test]
    fn invalid_id_is_reported_as_validation() {
        assert_eq!(DomainError::invalid_id("x").kind(), ErrorKind::Validation);
    }
}
