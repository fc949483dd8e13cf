//! `stockledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod document;
pub mod error;
pub mod id;
pub mod page;

pub use document::{Document, ExpectedVersion, Versioned};
pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{AggregateId, BusinessId, UserId, VariantId};
pub use page::{Page, Pagination};

/// Largest quantity a single order line or stock movement may carry.
pub const MAX_QUANTITY: i64 = 1_000_000_000;
