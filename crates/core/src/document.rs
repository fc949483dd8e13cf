//! Business-scoped documents and optimistic concurrency.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::BusinessId;

/// Document marker + minimal interface.
///
/// Order documents are owned by exactly one business. Storage adapters use
/// this to key documents and to enforce tenant isolation on writes.
pub trait Document {
    /// Strongly-typed document identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Returns the document identifier.
    fn id(&self) -> Self::Id;

    /// Returns the owning business.
    fn business_id(&self) -> BusinessId;
}

/// Optimistic concurrency expectation for a document write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (last writer wins).
    Any,
    /// Require the stored document to be at an exact version.
    ///
    /// `Exact(0)` means the document must not exist yet.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// A document as loaded from storage, together with its stored version.
///
/// Versions start at 1 on creation and grow by one per committed write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub document: T,
}

impl<T> Versioned<T> {
    pub fn new(version: u64, document: T) -> Self {
        Self { version, document }
    }

    /// Expectation to use when writing back a modified copy of this document.
    pub fn expected(&self) -> ExpectedVersion {
        ExpectedVersion::Exact(self.version)
    }

    pub fn into_document(self) -> T {
        self.document
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Versioned<U> {
        Versioned {
            version: self.version,
            document: f(self.document),
        }
    }
}
