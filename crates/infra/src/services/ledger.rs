use std::collections::BTreeSet;

use tracing::instrument;

use stockledger_core::{AggregateId, BusinessId, DomainError, DomainResult, VariantId};
use stockledger_inventory::{InboundReference, MovementDraft, OutboundReference, StockMovement};

use crate::store::{ChangeSet, Committed, LedgerStore, StoreError};

/// Stock Ledger Service: the only writer of movement records.
///
/// Single-movement operations (`deduct`, `add`, `adjust`) each run in their
/// own commit scope. Order components stage drafts into a [`ChangeSet`]
/// instead, so their movements commit together with the order document.
#[derive(Debug, Clone)]
pub struct StockLedgerService<S> {
    store: S,
}

impl<S: LedgerStore> StockLedgerService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fail with `NotFound` unless every variant is registered in the business.
    pub async fn ensure_registered(
        &self,
        business_id: BusinessId,
        variants: impl IntoIterator<Item = VariantId>,
    ) -> DomainResult<()> {
        let variants: BTreeSet<VariantId> = variants.into_iter().collect();
        for variant_id in variants {
            if self.store.variant(business_id, variant_id).await?.is_none() {
                tracing::debug!(business_id = %business_id, variant_id = %variant_id, "unknown variant");
                return Err(DomainError::not_found("variant"));
            }
        }
        Ok(())
    }

    /// Current derived balance (0 for a variant with no movements).
    pub async fn balance(&self, business_id: BusinessId, variant_id: VariantId) -> DomainResult<i64> {
        Ok(self.store.balance(business_id, variant_id).await?)
    }

    /// Movement log of a variant, in sequence order.
    pub async fn movements(
        &self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> DomainResult<Vec<StockMovement>> {
        Ok(self.store.movements(business_id, variant_id).await?)
    }

    #[instrument(skip_all, fields(business_id = %business_id, variant_id = %variant_id, quantity = quantity), err)]
    pub async fn deduct(
        &self,
        business_id: BusinessId,
        variant_id: VariantId,
        quantity: i64,
        reference: OutboundReference,
        reference_id: AggregateId,
    ) -> DomainResult<StockMovement> {
        let draft = MovementDraft::outbound(business_id, variant_id, quantity, reference, reference_id)?;
        self.commit_one(business_id, draft).await
    }

    #[instrument(skip_all, fields(business_id = %business_id, variant_id = %variant_id, quantity = quantity), err)]
    pub async fn add(
        &self,
        business_id: BusinessId,
        variant_id: VariantId,
        quantity: i64,
        reference: InboundReference,
        reference_id: AggregateId,
    ) -> DomainResult<StockMovement> {
        let draft = MovementDraft::inbound(business_id, variant_id, quantity, reference, reference_id)?;
        self.commit_one(business_id, draft).await
    }

    /// Manual correction by a signed delta. May take the balance below zero.
    #[instrument(skip_all, fields(business_id = %business_id, variant_id = %variant_id, quantity = quantity), err)]
    pub async fn adjust(
        &self,
        business_id: BusinessId,
        variant_id: VariantId,
        quantity: i64,
        note: Option<String>,
    ) -> DomainResult<StockMovement> {
        let draft = MovementDraft::adjustment(business_id, variant_id, quantity, note)?;
        self.commit_one(business_id, draft).await
    }

    /// Stage a guarded `OUT` draft for the change set's business.
    pub fn stage_deduct(
        &self,
        changes: &mut ChangeSet,
        variant_id: VariantId,
        quantity: i64,
        reference: OutboundReference,
        reference_id: AggregateId,
    ) -> DomainResult<()> {
        let draft =
            MovementDraft::outbound(changes.business_id(), variant_id, quantity, reference, reference_id)?;
        changes.push(draft);
        Ok(())
    }

    /// Stage an `IN` draft for the change set's business.
    pub fn stage_add(
        &self,
        changes: &mut ChangeSet,
        variant_id: VariantId,
        quantity: i64,
        reference: InboundReference,
        reference_id: AggregateId,
    ) -> DomainResult<()> {
        let draft =
            MovementDraft::inbound(changes.business_id(), variant_id, quantity, reference, reference_id)?;
        changes.push(draft);
        Ok(())
    }

    /// Commit a change set atomically.
    pub async fn commit(&self, changes: ChangeSet) -> DomainResult<Committed> {
        let business_id = changes.business_id();
        let staged = changes.movements().len();

        match self.store.commit(changes).await {
            Ok(committed) => {
                tracing::info!(
                    business_id = %business_id,
                    movement_count = committed.movements.len(),
                    document_version = ?committed.document_version,
                    "ledger commit"
                );
                Ok(committed)
            }
            Err(StoreError::InsufficientStock(shortfall)) => {
                tracing::warn!(
                    business_id = %business_id,
                    variant_id = %shortfall.variant_id,
                    available = shortfall.available,
                    requested = shortfall.requested,
                    staged,
                    "deduction rejected: insufficient stock"
                );
                Err(shortfall.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn commit_one(&self, business_id: BusinessId, draft: MovementDraft) -> DomainResult<StockMovement> {
        let mut changes = ChangeSet::new(business_id);
        changes.push(draft);
        self.commit(changes)
            .await?
            .movements
            .pop()
            .ok_or_else(|| DomainError::storage("commit returned no movement"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use stockledger_core::MAX_QUANTITY;
    use stockledger_inventory::{MovementType, ReferenceType, fold_balance};

    use crate::store::InMemoryLedgerStore;
    use crate::test_support::registered_variant;

    fn service() -> StockLedgerService<Arc<InMemoryLedgerStore>> {
        StockLedgerService::new(Arc::new(InMemoryLedgerStore::new()))
    }

    async fn registered<S: LedgerStore>(ledger: &StockLedgerService<S>, business_id: BusinessId) -> VariantId {
        registered_variant(ledger.store(), business_id).await
    }

    #[tokio::test]
    async fn empty_variant_has_zero_balance() {
        let ledger = service();
        assert_eq!(ledger.balance(BusinessId::new(), VariantId::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deduct_rejects_non_positive_quantity() {
        let ledger = service();
        let err = ledger
            .deduct(BusinessId::new(), VariantId::new(), 0, OutboundReference::SalesOrder, AggregateId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn deduct_beyond_balance_persists_nothing() {
        let ledger = service();
        let b = BusinessId::new();
        let v = registered(&ledger, b).await;
        ledger
            .add(b, v, 3, InboundReference::PurchaseOrder, AggregateId::new())
            .await
            .unwrap();

        let err = ledger
            .deduct(b, v, 5, OutboundReference::SalesOrder, AggregateId::new())
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(v, 3, 5));
        assert_eq!(ledger.movements(b, v).await.unwrap().len(), 1);
        assert_eq!(ledger.balance(b, v).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn adjustment_may_drive_balance_negative() {
        let ledger = service();
        let b = BusinessId::new();
        let v = registered(&ledger, b).await;

        let movement = ledger.adjust(b, v, -4, Some("shrinkage".into())).await.unwrap();
        assert_eq!(movement.movement_type, MovementType::Adjustment);
        assert_eq!(movement.reference_type, ReferenceType::Manual);
        assert_eq!(movement.note.as_deref(), Some("shrinkage"));
        assert_eq!(ledger.balance(b, v).await.unwrap(), -4);

        let err = ledger.adjust(b, v, 0, None).await.unwrap_err();
        assert_eq!(err, DomainError::validation("adjustment quantity is required"));
    }

    #[tokio::test]
    async fn movements_on_unknown_variants_are_not_found() {
        let ledger = service();
        let b = BusinessId::new();
        let err = ledger
            .add(b, VariantId::new(), 1, InboundReference::PurchaseOrder, AggregateId::new())
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::not_found("variant"));

        let err = ledger.adjust(b, VariantId::new(), 3, None).await.unwrap_err();
        assert_eq!(err, DomainError::not_found("variant"));
    }

    #[tokio::test]
    async fn oversized_quantities_are_rejected_without_breaking_the_store() {
        let ledger = service();
        let b = BusinessId::new();
        let (v, other) = (registered(&ledger, b).await, registered(&ledger, b).await);

        ledger.adjust(b, v, -5, None).await.unwrap();
        let err = ledger
            .deduct(b, v, i64::MAX, OutboundReference::SalesOrder, AggregateId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(ledger.balance(b, v).await.unwrap(), -5);

        for _ in 0..2 {
            let err = ledger.adjust(b, v, i64::MAX, None).await.unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
        assert_eq!(ledger.balance(b, v).await.unwrap(), -5);

        ledger.adjust(b, v, MAX_QUANTITY, None).await.unwrap();
        ledger.adjust(b, v, MAX_QUANTITY, None).await.unwrap();
        assert_eq!(ledger.balance(b, v).await.unwrap(), 2 * MAX_QUANTITY - 5);

        let movement = ledger
            .add(b, other, 1, InboundReference::PurchaseOrder, AggregateId::new())
            .await
            .unwrap();
        assert_eq!(movement.quantity, 1);
        assert_eq!(ledger.balance(b, other).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn balance_is_the_fold_of_the_log_and_idempotent() {
        let ledger = service();
        let b = BusinessId::new();
        let v = registered(&ledger, b).await;
        let other = registered(&ledger, b).await;

        ledger.add(b, v, 10, InboundReference::PurchaseOrder, AggregateId::new()).await.unwrap();
        ledger.deduct(b, v, 4, OutboundReference::SalesOrder, AggregateId::new()).await.unwrap();
        ledger.adjust(b, v, 2, None).await.unwrap();
        ledger.add(b, other, 7, InboundReference::Return, AggregateId::new()).await.unwrap();

        let first = ledger.balance(b, v).await.unwrap();
        let second = ledger.balance(b, v).await.unwrap();
        assert_eq!(first, 8);
        assert_eq!(first, second);
        assert_eq!(fold_balance(&ledger.movements(b, v).await.unwrap()), Some(first));
        assert_eq!(ledger.balance(b, other).await.unwrap(), 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deductions_never_oversell() {
        let ledger = Arc::new(service());
        let b = BusinessId::new();
        let v = registered(&*ledger, b).await;
        ledger.add(b, v, 25, InboundReference::PurchaseOrder, AggregateId::new()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..40 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                let qty = 1 + (i % 3);
                ledger
                    .deduct(b, v, qty, OutboundReference::SalesOrder, AggregateId::new())
                    .await
                    .map(|_| qty)
            }));
        }

        let mut deducted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(qty) => deducted += qty,
                Err(err) => assert!(matches!(err, DomainError::InsufficientStock { .. })),
            }
        }

        let balance = ledger.balance(b, v).await.unwrap();
        assert!(balance >= 0);
        assert_eq!(balance, 25 - deducted);

        // Every prefix of the committed log stays non-negative.
        let mut running = 0;
        for movement in ledger.movements(b, v).await.unwrap() {
            running += movement.signed_quantity();
            assert!(running >= 0);
        }
    }

    #[tokio::test]
    async fn staged_drafts_commit_together() {
        let ledger = service();
        let b = BusinessId::new();
        let v = registered(&ledger, b).await;
        let reference = AggregateId::new();

        let mut changes = ChangeSet::new(b);
        ledger.stage_add(&mut changes, v, 4, InboundReference::PurchaseOrder, reference).unwrap();
        ledger.stage_deduct(&mut changes, v, 3, OutboundReference::SalesOrder, reference).unwrap();
        assert!(ledger.stage_deduct(&mut changes, v, -1, OutboundReference::SalesOrder, reference).is_err());

        let committed = ledger.commit(changes).await.unwrap();
        assert_eq!(committed.movements.len(), 2);
        assert!(committed.movements.iter().all(|m| m.reference_id == Some(reference)));
        assert_eq!(ledger.balance(b, v).await.unwrap(), 1);
    }
}
