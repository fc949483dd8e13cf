use chrono::Utc;
use tracing::instrument;

use stockledger_auth::{Action, AuthContext, Resource, authorize};
use stockledger_core::{
    AggregateId, Document, DomainError, DomainResult, ExpectedVersion, Page, Pagination, Versioned,
};
use stockledger_inventory::InboundReference;
use stockledger_purchasing::{
    NewPurchaseOrder, PurchaseOrder, PurchaseOrderId, PurchaseOrderStatus, Receipt, ReceivedItem,
};

use super::StockLedgerService;
use crate::store::{ChangeSet, DocumentWrite, LedgerStore};

/// Purchase-Order Reconciler.
///
/// Drives receiving against ordered quantities. Every receipt becomes an
/// `IN` / `PURCHASE_ORDER` movement committed in the same scope as the
/// updated order, so counters and stock never drift apart.
#[derive(Debug, Clone)]
pub struct PurchaseOrderReconciler<S> {
    ledger: StockLedgerService<S>,
}

impl<S: LedgerStore> PurchaseOrderReconciler<S> {
    pub fn new(store: S) -> Self {
        Self {
            ledger: StockLedgerService::new(store),
        }
    }

    #[instrument(skip_all, fields(business_id = %ctx.business_id), err)]
    pub async fn create(
        &self,
        ctx: &AuthContext,
        input: NewPurchaseOrder,
    ) -> DomainResult<Versioned<PurchaseOrder>> {
        authorize(ctx, Action::Create, Resource::PurchaseOrder)?;

        let order = PurchaseOrder::create(
            PurchaseOrderId::new(AggregateId::new()),
            ctx.business_id,
            input,
            Utc::now(),
        )?;
        self.ledger
            .ensure_registered(ctx.business_id, order.items().iter().map(|i| i.variant_id))
            .await?;
        self.save(ChangeSet::new(ctx.business_id), order, ExpectedVersion::Exact(0))
            .await
    }

    pub async fn get(&self, ctx: &AuthContext, id: PurchaseOrderId) -> DomainResult<Versioned<PurchaseOrder>> {
        authorize(ctx, Action::Read, Resource::PurchaseOrder)?;
        self.load(ctx, id).await
    }

    pub async fn list(
        &self,
        ctx: &AuthContext,
        status: Option<PurchaseOrderStatus>,
        pagination: Pagination,
    ) -> DomainResult<Page<Versioned<PurchaseOrder>>> {
        authorize(ctx, Action::Read, Resource::PurchaseOrder)?;
        Ok(self
            .ledger
            .store()
            .purchase_orders(ctx.business_id, status, pagination)
            .await?)
    }

    /// Explicit status change. Targeting RECEIVED receives everything
    /// outstanding and is authorized like [`Self::force_receive_all`].
    #[instrument(skip_all, fields(business_id = %ctx.business_id, order_id = %id, target = %target), err)]
    pub async fn update_status(
        &self,
        ctx: &AuthContext,
        id: PurchaseOrderId,
        target: PurchaseOrderStatus,
    ) -> DomainResult<Versioned<PurchaseOrder>> {
        authorize(ctx, status_action(target), Resource::PurchaseOrder)?;
        if target == PurchaseOrderStatus::Draft {
            return Err(DomainError::validation("invalid status transition"));
        }

        let current = self.load(ctx, id).await?;
        let mut order = current.document.clone();
        let receipts = order.transition(target, Utc::now())?;
        self.reconcile(current.expected(), order, receipts).await
    }

    #[instrument(skip_all, fields(business_id = %ctx.business_id, order_id = %id), err)]
    pub async fn force_receive_all(
        &self,
        ctx: &AuthContext,
        id: PurchaseOrderId,
    ) -> DomainResult<Versioned<PurchaseOrder>> {
        authorize(ctx, status_action(PurchaseOrderStatus::Received), Resource::PurchaseOrder)?;

        let current = self.load(ctx, id).await?;
        let mut order = current.document.clone();
        let receipts = order.receive_all(Utc::now())?;
        self.reconcile(current.expected(), order, receipts).await
    }

    #[instrument(skip_all, fields(business_id = %ctx.business_id, order_id = %id, entries = received.len()), err)]
    pub async fn receive_partial(
        &self,
        ctx: &AuthContext,
        id: PurchaseOrderId,
        received: &[ReceivedItem],
    ) -> DomainResult<Versioned<PurchaseOrder>> {
        authorize(ctx, Action::Receive, Resource::PurchaseOrder)?;

        let current = self.load(ctx, id).await?;
        let mut order = current.document.clone();
        let receipts = order.receive_partial(received, Utc::now())?;
        self.reconcile(current.expected(), order, receipts).await
    }

    async fn load(&self, ctx: &AuthContext, id: PurchaseOrderId) -> DomainResult<Versioned<PurchaseOrder>> {
        self.ledger
            .store()
            .purchase_order(ctx.business_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("purchase order"))
    }

    async fn reconcile(
        &self,
        expected: ExpectedVersion,
        order: PurchaseOrder,
        receipts: Vec<Receipt>,
    ) -> DomainResult<Versioned<PurchaseOrder>> {
        let mut changes = ChangeSet::new(order.business_id());
        for receipt in &receipts {
            self.ledger.stage_add(
                &mut changes,
                receipt.variant_id,
                receipt.quantity,
                InboundReference::PurchaseOrder,
                order.id_typed().0,
            )?;
        }
        self.save(changes, order, expected).await
    }

    async fn save(
        &self,
        changes: ChangeSet,
        order: PurchaseOrder,
        expected: ExpectedVersion,
    ) -> DomainResult<Versioned<PurchaseOrder>> {
        let committed = self
            .ledger
            .commit(changes.with_document(DocumentWrite::purchase_order(order.clone(), expected)))
            .await?;
        let version = committed
            .document_version
            .ok_or_else(|| DomainError::storage("purchase order write returned no version"))?;
        Ok(Versioned::new(version, order))
    }
}

/// Policy action for moving an order to `target`. Reaching RECEIVED books
/// stock, so it is a receive whichever route requests it.
fn status_action(target: PurchaseOrderStatus) -> Action {
    match target {
        PurchaseOrderStatus::Received => Action::Receive,
        _ => Action::UpdateStatus,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use stockledger_auth::Role;
    use stockledger_core::{BusinessId, UserId, VariantId};
    use stockledger_inventory::{MovementType, ReferenceType};
    use stockledger_purchasing::NewPurchaseOrderItem;

    use crate::store::InMemoryLedgerStore;
    use crate::test_support::registered_variant;

    struct Fixture {
        store: Arc<InMemoryLedgerStore>,
        reconciler: PurchaseOrderReconciler<Arc<InMemoryLedgerStore>>,
        manager: AuthContext,
        staff: AuthContext,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryLedgerStore::new());
        let business_id = BusinessId::new();
        Fixture {
            reconciler: PurchaseOrderReconciler::new(Arc::clone(&store)),
            store,
            manager: AuthContext::new(UserId::new(), business_id, Role::Manager),
            staff: AuthContext::new(UserId::new(), business_id, Role::Staff),
        }
    }

    impl Fixture {
        async fn variant(&self) -> VariantId {
            registered_variant(&self.store, self.manager.business_id).await
        }
    }

    fn new_order(lines: &[(VariantId, i64)]) -> NewPurchaseOrder {
        NewPurchaseOrder {
            supplier_id: "supplier-1".into(),
            items: lines
                .iter()
                .map(|(v, q)| NewPurchaseOrderItem {
                    variant_id: *v,
                    ordered_qty: *q,
                    cost_price: 500,
                })
                .collect(),
            notes: Some("first batch".into()),
        }
    }

    #[tokio::test]
    async fn partial_receipts_reconcile_to_received() {
        let f = fixture();
        let v = f.variant().await;
        let created = f.reconciler.create(&f.manager, new_order(&[(v, 10)])).await.unwrap();
        assert_eq!(created.version, 1);
        let id = created.document.id_typed();

        let after_first = f
            .reconciler
            .receive_partial(&f.staff, id, &[ReceivedItem { variant_id: v, qty: 4 }])
            .await
            .unwrap();
        assert_eq!(after_first.document.items()[0].received_qty, 4);
        assert_ne!(after_first.document.status(), PurchaseOrderStatus::Received);

        let after_second = f
            .reconciler
            .receive_partial(&f.staff, id, &[ReceivedItem { variant_id: v, qty: 6 }])
            .await
            .unwrap();
        assert_eq!(after_second.document.items()[0].received_qty, 10);
        assert_eq!(after_second.document.status(), PurchaseOrderStatus::Received);
        assert_eq!(after_second.version, 3);

        let balance = f.store.balance(f.manager.business_id, v).await.unwrap();
        assert_eq!(balance, 10);

        let movements = f.store.movements(f.manager.business_id, v).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert!(movements.iter().all(|m| m.movement_type == MovementType::In
            && m.reference_type == ReferenceType::PurchaseOrder
            && m.reference_id == Some(id.0)));
    }

    #[tokio::test]
    async fn receiving_past_the_ordered_quantity_fails() {
        let f = fixture();
        let v = f.variant().await;
        let id = f
            .reconciler
            .create(&f.manager, new_order(&[(v, 10)]))
            .await
            .unwrap()
            .document
            .id_typed();

        let err = f
            .reconciler
            .receive_partial(&f.staff, id, &[ReceivedItem { variant_id: v, qty: 11 }])
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::validation("received quantity exceeds ordered quantity"));
        assert_eq!(f.store.balance(f.manager.business_id, v).await.unwrap(), 0);

        f.reconciler
            .receive_partial(&f.staff, id, &[ReceivedItem { variant_id: v, qty: 10 }])
            .await
            .unwrap();
        let err = f
            .reconciler
            .receive_partial(&f.staff, id, &[ReceivedItem { variant_id: v, qty: 1 }])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn status_received_books_the_outstanding_remainder() {
        let f = fixture();
        let (v1, v2) = (f.variant().await, f.variant().await);
        let id = f
            .reconciler
            .create(&f.manager, new_order(&[(v1, 5), (v2, 8)]))
            .await
            .unwrap()
            .document
            .id_typed();

        f.reconciler.update_status(&f.manager, id, PurchaseOrderStatus::Sent).await.unwrap();
        f.reconciler
            .receive_partial(&f.staff, id, &[ReceivedItem { variant_id: v2, qty: 3 }])
            .await
            .unwrap();

        let received = f
            .reconciler
            .update_status(&f.manager, id, PurchaseOrderStatus::Received)
            .await
            .unwrap();
        assert!(received.document.is_fully_received());

        let b = f.manager.business_id;
        assert_eq!(f.store.balance(b, v1).await.unwrap(), 5);
        assert_eq!(f.store.balance(b, v2).await.unwrap(), 8);

        let err = f
            .reconciler
            .update_status(&f.manager, id, PurchaseOrderStatus::Received)
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::invalid_state("purchase order already received"));
        assert_eq!(f.store.balance(b, v1).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn draft_is_not_a_valid_target() {
        let f = fixture();
        let id = f
            .reconciler
            .create(&f.manager, new_order(&[(f.variant().await, 1)]))
            .await
            .unwrap()
            .document
            .id_typed();

        let err = f
            .reconciler
            .update_status(&f.manager, id, PurchaseOrderStatus::Draft)
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::validation("invalid status transition"));
    }

    #[tokio::test]
    async fn staff_cannot_create_or_move_status() {
        let f = fixture();
        let err = f
            .reconciler
            .create(&f.staff, new_order(&[(f.variant().await, 1)]))
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::forbidden("access denied"));

        let id = f
            .reconciler
            .create(&f.manager, new_order(&[(f.variant().await, 1)]))
            .await
            .unwrap()
            .document
            .id_typed();
        assert!(matches!(
            f.reconciler.update_status(&f.staff, id, PurchaseOrderStatus::Sent).await,
            Err(DomainError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn staff_receive_the_same_way_through_either_route() {
        let f = fixture();
        let b = f.manager.business_id;
        let (v1, v2) = (f.variant().await, f.variant().await);
        let by_status = f.reconciler.create(&f.manager, new_order(&[(v1, 4)])).await.unwrap();
        let by_receive = f.reconciler.create(&f.manager, new_order(&[(v2, 4)])).await.unwrap();

        let via_status = f
            .reconciler
            .update_status(&f.staff, by_status.document.id_typed(), PurchaseOrderStatus::Received)
            .await
            .unwrap();
        let via_receive = f
            .reconciler
            .force_receive_all(&f.staff, by_receive.document.id_typed())
            .await
            .unwrap();

        assert_eq!(via_status.document.status(), PurchaseOrderStatus::Received);
        assert_eq!(via_receive.document.status(), PurchaseOrderStatus::Received);
        assert_eq!(f.store.balance(b, v1).await.unwrap(), 4);
        assert_eq!(f.store.balance(b, v2).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn orders_must_reference_registered_variants() {
        let f = fixture();
        let known = f.variant().await;
        let err = f
            .reconciler
            .create(&f.manager, new_order(&[(known, 2), (VariantId::new(), 1)]))
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::not_found("variant"));

        let foreign = registered_variant(&f.store, BusinessId::new()).await;
        assert!(matches!(
            f.reconciler.create(&f.manager, new_order(&[(foreign, 1)])).await,
            Err(DomainError::NotFound(_))
        ));
        assert_eq!(f.reconciler.list(&f.staff, None, Pagination::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn other_businesses_see_not_found() {
        let f = fixture();
        let id = f
            .reconciler
            .create(&f.manager, new_order(&[(f.variant().await, 1)]))
            .await
            .unwrap()
            .document
            .id_typed();

        let outsider = AuthContext::new(UserId::new(), BusinessId::new(), Role::Owner);
        assert_eq!(
            f.reconciler.get(&outsider, id).await.unwrap_err(),
            DomainError::not_found("purchase order")
        );
        assert!(matches!(
            f.reconciler.force_receive_all(&outsider, id).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let f = fixture();
        for _ in 0..2 {
            f.reconciler
                .create(&f.manager, new_order(&[(f.variant().await, 1)]))
                .await
                .unwrap();
        }
        let id = f
            .reconciler
            .create(&f.manager, new_order(&[(f.variant().await, 1)]))
            .await
            .unwrap()
            .document
            .id_typed();
        f.reconciler.update_status(&f.manager, id, PurchaseOrderStatus::Sent).await.unwrap();

        let drafts = f
            .reconciler
            .list(&f.staff, Some(PurchaseOrderStatus::Draft), Pagination::default())
            .await
            .unwrap();
        assert_eq!(drafts.total, 2);

        let all = f.reconciler.list(&f.staff, None, Pagination::default()).await.unwrap();
        assert_eq!(all.total, 3);
    }
}
