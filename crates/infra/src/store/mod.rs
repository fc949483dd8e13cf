//! Stock ledger persistence boundary.
//!
//! This module defines the storage-facing abstraction the services run on:
//! read access to the movement log and order documents, plus one atomic
//! conditional-commit primitive ([`LedgerStore::commit`]) that is the only
//! way movements and order documents are ever written.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use stockledger_core::{
    BusinessId, Document, DomainError, ExpectedVersion, Page, Pagination, VariantId, Versioned,
};
use stockledger_inventory::{MovementDraft, Rejection, Shortfall, StockMovement, Variant};
use stockledger_purchasing::{PurchaseOrder, PurchaseOrderId, PurchaseOrderStatus};
use stockledger_sales::{SalesOrder, SalesOrderId, SalesOrderStatus};

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;

/// Ledger store operation error.
///
/// These are **infrastructure errors** (storage, concurrency, isolation) plus
/// the guard rejection raised inside the commit scope.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error(
        "insufficient stock for variant {}: available {}, requested {}",
        .0.variant_id, .0.available, .0.requested
    )]
    InsufficientStock(Shortfall),

    #[error("variant {0} is not registered")]
    UnknownVariant(VariantId),

    #[error("balance of variant {0} is out of range")]
    BalanceOutOfRange(VariantId),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => DomainError::conflict(msg),
            StoreError::TenantIsolation(_) => DomainError::forbidden("access denied"),
            StoreError::InsufficientStock(shortfall) => shortfall.into(),
            StoreError::UnknownVariant(_) => DomainError::not_found("variant"),
            StoreError::BalanceOutOfRange(variant_id) => {
                DomainError::validation(format!("balance of variant {variant_id} is out of range"))
            }
            StoreError::Backend(msg) => DomainError::storage(msg),
        }
    }
}

impl From<Rejection> for StoreError {
    fn from(value: Rejection) -> Self {
        match value {
            Rejection::Shortfall(shortfall) => StoreError::InsufficientStock(shortfall),
            Rejection::OutOfRange { variant_id, .. } => StoreError::BalanceOutOfRange(variant_id),
        }
    }
}

/// Order document written together with a change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentWrite {
    PurchaseOrder {
        document: PurchaseOrder,
        expected: ExpectedVersion,
    },
    SalesOrder {
        document: SalesOrder,
        expected: ExpectedVersion,
    },
}

impl DocumentWrite {
    pub fn purchase_order(document: PurchaseOrder, expected: ExpectedVersion) -> Self {
        DocumentWrite::PurchaseOrder { document, expected }
    }

    pub fn sales_order(document: SalesOrder, expected: ExpectedVersion) -> Self {
        DocumentWrite::SalesOrder { document, expected }
    }

    pub fn business_id(&self) -> BusinessId {
        match self {
            DocumentWrite::PurchaseOrder { document, .. } => document.business_id(),
            DocumentWrite::SalesOrder { document, .. } => document.business_id(),
        }
    }

    pub fn expected(&self) -> ExpectedVersion {
        match self {
            DocumentWrite::PurchaseOrder { expected, .. } | DocumentWrite::SalesOrder { expected, .. } => {
                *expected
            }
        }
    }
}

/// Unit of work for [`LedgerStore::commit`].
///
/// Holds validated movement drafts (admitted in insertion order) and at most
/// one order document. Everything must belong to `business_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    business_id: BusinessId,
    movements: Vec<MovementDraft>,
    document: Option<DocumentWrite>,
}

impl ChangeSet {
    pub fn new(business_id: BusinessId) -> Self {
        Self {
            business_id,
            movements: Vec::new(),
            document: None,
        }
    }

    pub fn business_id(&self) -> BusinessId {
        self.business_id
    }

    pub fn push(&mut self, draft: MovementDraft) {
        self.movements.push(draft);
    }

    pub fn set_document(&mut self, write: DocumentWrite) {
        self.document = Some(write);
    }

    pub fn with_document(mut self, write: DocumentWrite) -> Self {
        self.set_document(write);
        self
    }

    pub fn movements(&self) -> &[MovementDraft] {
        &self.movements
    }

    pub fn document(&self) -> Option<&DocumentWrite> {
        self.document.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.movements.is_empty() && self.document.is_none()
    }

    /// Reject change sets that reach outside their business.
    pub fn ensure_single_business(&self) -> Result<(), StoreError> {
        if let Some(idx) = self
            .movements
            .iter()
            .position(|d| d.business_id() != self.business_id)
        {
            return Err(StoreError::TenantIsolation(format!(
                "change set contains a movement for another business (index {idx})"
            )));
        }
        if let Some(doc) = &self.document {
            if doc.business_id() != self.business_id {
                return Err(StoreError::TenantIsolation(
                    "change set document belongs to another business".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn into_parts(self) -> (BusinessId, Vec<MovementDraft>, Option<DocumentWrite>) {
        (self.business_id, self.movements, self.document)
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    /// Appended movements, in sequence order.
    pub movements: Vec<StockMovement>,
    /// Version the document was written at, if the change set carried one.
    pub document_version: Option<u64>,
}

/// Business-scoped stock ledger storage.
///
/// ## Commit Semantics
///
/// `commit()` runs in one isolated scope and:
/// - enforces tenant isolation (everything belongs to one business)
/// - rejects drafts on variants the business has not registered
/// - checks the document write against its `ExpectedVersion`
/// - computes the opening balance of every variant carrying a guarded draft
/// - admits the drafts in order against running balances
/// - appends the drafts, assigning id, sequence number and `created_at`
/// - writes the document at `version + 1`
///
/// Any failure leaves no trace: no movement and no document change survive.
/// Balance arithmetic is checked; a balance that would leave the `i64` range
/// fails with [`StoreError::BalanceOutOfRange`].
///
/// ## Read Semantics
///
/// Reads never cross businesses. A document owned by another business is
/// indistinguishable from a missing one. An empty movement log has balance 0.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Add a variant to its business's registry. A taken id or SKU is a
    /// `Conflict`.
    async fn register_variant(&self, variant: Variant) -> Result<(), StoreError>;

    async fn variant(
        &self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>, StoreError>;

    /// Movement log of one variant, in sequence order.
    async fn movements(
        &self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Vec<StockMovement>, StoreError>;

    /// Derived balance of one variant.
    async fn balance(&self, business_id: BusinessId, variant_id: VariantId) -> Result<i64, StoreError>;

    async fn purchase_order(
        &self,
        business_id: BusinessId,
        id: PurchaseOrderId,
    ) -> Result<Option<Versioned<PurchaseOrder>>, StoreError>;

    /// Purchase orders of a business, newest first.
    async fn purchase_orders(
        &self,
        business_id: BusinessId,
        status: Option<PurchaseOrderStatus>,
        pagination: Pagination,
    ) -> Result<Page<Versioned<PurchaseOrder>>, StoreError>;

    async fn sales_order(
        &self,
        business_id: BusinessId,
        id: SalesOrderId,
    ) -> Result<Option<Versioned<SalesOrder>>, StoreError>;

    /// Sales orders of a business, newest first.
    async fn sales_orders(
        &self,
        business_id: BusinessId,
        status: Option<SalesOrderStatus>,
        pagination: Pagination,
    ) -> Result<Page<Versioned<SalesOrder>>, StoreError>;

    /// Atomically apply a change set.
    async fn commit(&self, changes: ChangeSet) -> Result<Committed, StoreError>;
}

#[async_trait::async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn register_variant(&self, variant: Variant) -> Result<(), StoreError> {
        (**self).register_variant(variant).await
    }

    async fn variant(
        &self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>, StoreError> {
        (**self).variant(business_id, variant_id).await
    }

    async fn movements(
        &self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Vec<StockMovement>, StoreError> {
        (**self).movements(business_id, variant_id).await
    }

    async fn balance(&self, business_id: BusinessId, variant_id: VariantId) -> Result<i64, StoreError> {
        (**self).balance(business_id, variant_id).await
    }

    async fn purchase_order(
        &self,
        business_id: BusinessId,
        id: PurchaseOrderId,
    ) -> Result<Option<Versioned<PurchaseOrder>>, StoreError> {
        (**self).purchase_order(business_id, id).await
    }

    async fn purchase_orders(
        &self,
        business_id: BusinessId,
        status: Option<PurchaseOrderStatus>,
        pagination: Pagination,
    ) -> Result<Page<Versioned<PurchaseOrder>>, StoreError> {
        (**self).purchase_orders(business_id, status, pagination).await
    }

    async fn sales_order(
        &self,
        business_id: BusinessId,
        id: SalesOrderId,
    ) -> Result<Option<Versioned<SalesOrder>>, StoreError> {
        (**self).sales_order(business_id, id).await
    }

    async fn sales_orders(
        &self,
        business_id: BusinessId,
        status: Option<SalesOrderStatus>,
        pagination: Pagination,
    ) -> Result<Page<Versioned<SalesOrder>>, StoreError> {
        (**self).sales_orders(business_id, status, pagination).await
    }

    async fn commit(&self, changes: ChangeSet) -> Result<Committed, StoreError> {
        (**self).commit(changes).await
    }
}

/// Storage shape shared by both order document kinds.
pub(crate) trait StoredDocument:
    Document + Clone + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static
{
    const TABLE: &'static str;

    fn key(id: Self::Id) -> Uuid;

    fn status_str(&self) -> &'static str;

    /// `(created_at, updated_at)`.
    fn timestamps(&self) -> (DateTime<Utc>, DateTime<Utc>);
}

impl StoredDocument for PurchaseOrder {
    const TABLE: &'static str = "purchase_orders";

    fn key(id: PurchaseOrderId) -> Uuid {
        *id.0.as_uuid()
    }

    fn status_str(&self) -> &'static str {
        self.status().as_str()
    }

    fn timestamps(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.created_at(), self.updated_at())
    }
}

impl StoredDocument for SalesOrder {
    const TABLE: &'static str = "sales_orders";

    fn key(id: SalesOrderId) -> Uuid {
        *id.0.as_uuid()
    }

    fn status_str(&self) -> &'static str {
        self.status().as_str()
    }

    fn timestamps(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.created_at(), self.updated_at())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::AggregateId;
    use stockledger_inventory::InboundReference;

    #[test]
    fn change_set_rejects_foreign_movements() {
        let business = BusinessId::new();
        let mut changes = ChangeSet::new(business);
        changes.push(
            MovementDraft::inbound(
                BusinessId::new(),
                VariantId::new(),
                1,
                InboundReference::Return,
                AggregateId::new(),
            )
            .unwrap(),
        );

        assert!(matches!(
            changes.ensure_single_business(),
            Err(StoreError::TenantIsolation(_))
        ));
    }

    #[test]
    fn store_errors_map_to_domain_kinds() {
        let shortfall = Shortfall {
            business_id: BusinessId::new(),
            variant_id: VariantId::new(),
            available: 3,
            requested: 5,
        };
        let err: DomainError = StoreError::InsufficientStock(shortfall.clone()).into();
        assert_eq!(
            err,
            DomainError::insufficient_stock(shortfall.variant_id, 3, 5)
        );

        let err: DomainError = StoreError::Conflict("stale".into()).into();
        assert!(matches!(err, DomainError::Conflict(_)));

        let err: DomainError = StoreError::Backend("down".into()).into();
        assert!(matches!(err, DomainError::Storage(_)));

        let err: DomainError = StoreError::UnknownVariant(VariantId::new()).into();
        assert_eq!(err, DomainError::not_found("variant"));

        let err: DomainError = StoreError::BalanceOutOfRange(VariantId::new()).into();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
