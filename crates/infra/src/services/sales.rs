use chrono::Utc;
use tracing::instrument;

use stockledger_auth::{Action, AuthContext, Resource, authorize};
use stockledger_core::{
    AggregateId, Document, DomainError, DomainResult, ExpectedVersion, Page, Pagination, Versioned,
};
use stockledger_inventory::{InboundReference, OutboundReference};
use stockledger_sales::{NewSalesOrder, SalesOrder, SalesOrderId, SalesOrderStatus};

use super::StockLedgerService;
use crate::store::{ChangeSet, DocumentWrite, LedgerStore};

/// Sales-Order Lifecycle.
///
/// Confirmation deducts every line and cancellation of a confirmed order
/// returns every line. In both cases the movements and the status change
/// commit in one change set whose document write is version-checked, so a
/// transition is accounted exactly once even under concurrent requests.
#[derive(Debug, Clone)]
pub struct SalesOrderLifecycle<S> {
    ledger: StockLedgerService<S>,
}

impl<S: LedgerStore> SalesOrderLifecycle<S> {
    pub fn new(store: S) -> Self {
        Self {
            ledger: StockLedgerService::new(store),
        }
    }

    #[instrument(skip_all, fields(business_id = %ctx.business_id), err)]
    pub async fn create(&self, ctx: &AuthContext, input: NewSalesOrder) -> DomainResult<Versioned<SalesOrder>> {
        authorize(ctx, Action::Create, Resource::SalesOrder)?;

        let order = SalesOrder::place(SalesOrderId::new(AggregateId::new()), ctx.business_id, input, Utc::now())?;
        self.ledger
            .ensure_registered(ctx.business_id, order.items().iter().map(|i| i.variant_id))
            .await?;
        self.save(ChangeSet::new(ctx.business_id), order, ExpectedVersion::Exact(0))
            .await
    }

    pub async fn get(&self, ctx: &AuthContext, id: SalesOrderId) -> DomainResult<Versioned<SalesOrder>> {
        authorize(ctx, Action::Read, Resource::SalesOrder)?;
        self.load(ctx, id).await
    }

    pub async fn list(
        &self,
        ctx: &AuthContext,
        status: Option<SalesOrderStatus>,
        pagination: Pagination,
    ) -> DomainResult<Page<Versioned<SalesOrder>>> {
        authorize(ctx, Action::Read, Resource::SalesOrder)?;
        Ok(self
            .ledger
            .store()
            .sales_orders(ctx.business_id, status, pagination)
            .await?)
    }

    /// PLACED -> CONFIRMED, deducting every line or nothing at all.
    #[instrument(skip_all, fields(business_id = %ctx.business_id, order_id = %id), err)]
    pub async fn confirm(&self, ctx: &AuthContext, id: SalesOrderId) -> DomainResult<Versioned<SalesOrder>> {
        authorize(ctx, Action::Confirm, Resource::SalesOrder)?;

        let current = self.load(ctx, id).await?;
        let mut order = current.document.clone();
        let lines = order.confirm(Utc::now())?;

        let mut changes = ChangeSet::new(order.business_id());
        for line in lines {
            self.ledger.stage_deduct(
                &mut changes,
                line.variant_id,
                line.quantity,
                OutboundReference::SalesOrder,
                id.0,
            )?;
        }
        self.save(changes, order, current.expected()).await
    }

    /// Cancel, returning stock with `RETURN` movements if the order was confirmed.
    #[instrument(skip_all, fields(business_id = %ctx.business_id, order_id = %id), err)]
    pub async fn cancel(&self, ctx: &AuthContext, id: SalesOrderId) -> DomainResult<Versioned<SalesOrder>> {
        authorize(ctx, Action::Cancel, Resource::SalesOrder)?;

        let current = self.load(ctx, id).await?;
        let mut order = current.document.clone();
        let returned = order.cancel(Utc::now())?;

        let mut changes = ChangeSet::new(order.business_id());
        for line in returned {
            self.ledger.stage_add(
                &mut changes,
                line.variant_id,
                line.quantity,
                InboundReference::Return,
                id.0,
            )?;
        }
        self.save(changes, order, current.expected()).await
    }

    async fn load(&self, ctx: &AuthContext, id: SalesOrderId) -> DomainResult<Versioned<SalesOrder>> {
        self.ledger
            .store()
            .sales_order(ctx.business_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("sales order"))
    }

    async fn save(
        &self,
        changes: ChangeSet,
        order: SalesOrder,
        expected: ExpectedVersion,
    ) -> DomainResult<Versioned<SalesOrder>> {
        let committed = self
            .ledger
            .commit(changes.with_document(DocumentWrite::sales_order(order.clone(), expected)))
            .await?;
        let version = committed
            .document_version
            .ok_or_else(|| DomainError::storage("sales order write returned no version"))?;
        Ok(Versioned::new(version, order))
    }
}
