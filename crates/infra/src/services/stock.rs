use chrono::Utc;
use tracing::instrument;

use stockledger_auth::{Action, AuthContext, Resource, authorize};
use stockledger_core::{DomainError, DomainResult, VariantId};
use stockledger_inventory::{NewVariant, StockMovement, Variant};

use super::StockLedgerService;
use crate::store::LedgerStore;

/// Balance of a registered variant together with its low-stock flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub variant: Variant,
    pub balance: i64,
    pub low_stock: bool,
}

/// Caller-facing stock operations: the variant registry, balance and log
/// reads, and manual adjustments. Every entry point authorizes the caller
/// before touching the ledger.
#[derive(Debug, Clone)]
pub struct StockKeeper<S> {
    ledger: StockLedgerService<S>,
}

impl<S: LedgerStore> StockKeeper<S> {
    pub fn new(store: S) -> Self {
        Self {
            ledger: StockLedgerService::new(store),
        }
    }

    #[instrument(skip_all, fields(business_id = %ctx.business_id), err)]
    pub async fn register_variant(&self, ctx: &AuthContext, input: NewVariant) -> DomainResult<Variant> {
        authorize(ctx, Action::Create, Resource::Variant)?;

        let variant = Variant::register(VariantId::new(), ctx.business_id, input, Utc::now())?;
        self.ledger.store().register_variant(variant.clone()).await?;
        tracing::info!(
            business_id = %ctx.business_id,
            variant_id = %variant.id(),
            sku = variant.sku(),
            "variant registered"
        );
        Ok(variant)
    }

    pub async fn variant(&self, ctx: &AuthContext, id: VariantId) -> DomainResult<Variant> {
        authorize(ctx, Action::Read, Resource::Variant)?;
        self.load(ctx, id).await
    }

    pub async fn level(&self, ctx: &AuthContext, id: VariantId) -> DomainResult<StockLevel> {
        authorize(ctx, Action::Read, Resource::Stock)?;

        let variant = self.load(ctx, id).await?;
        let balance = self.ledger.balance(ctx.business_id, id).await?;
        Ok(StockLevel {
            low_stock: variant.is_low_stock(balance),
            variant,
            balance,
        })
    }

    pub async fn movements(&self, ctx: &AuthContext, id: VariantId) -> DomainResult<Vec<StockMovement>> {
        authorize(ctx, Action::Read, Resource::Stock)?;

        self.load(ctx, id).await?;
        self.ledger.movements(ctx.business_id, id).await
    }

    /// Manual correction by a signed delta.
    pub async fn adjust(
        &self,
        ctx: &AuthContext,
        id: VariantId,
        quantity: i64,
        note: Option<String>,
    ) -> DomainResult<StockMovement> {
        authorize(ctx, Action::Adjust, Resource::Stock)?;
        self.ledger.adjust(ctx.business_id, id, quantity, note).await
    }

    async fn load(&self, ctx: &AuthContext, id: VariantId) -> DomainResult<Variant> {
        self.ledger
            .store()
            .variant(ctx.business_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("variant"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use stockledger_auth::Role;
    use stockledger_core::{BusinessId, UserId};
    use stockledger_inventory::{DEFAULT_LOW_STOCK_THRESHOLD, MovementType};

    use crate::store::InMemoryLedgerStore;

    struct Fixture {
        keeper: StockKeeper<Arc<InMemoryLedgerStore>>,
        owner: AuthContext,
        staff: AuthContext,
    }

    fn fixture() -> Fixture {
        let business_id = BusinessId::new();
        Fixture {
            keeper: StockKeeper::new(Arc::new(InMemoryLedgerStore::new())),
            owner: AuthContext::new(UserId::new(), business_id, Role::Owner),
            staff: AuthContext::new(UserId::new(), business_id, Role::Staff),
        }
    }

    fn sku(sku: &str, threshold: Option<i64>) -> NewVariant {
        NewVariant {
            sku: sku.into(),
            low_stock_threshold: threshold,
        }
    }

    #[tokio::test]
    async fn registered_variants_start_empty_and_low() {
        let f = fixture();
        let variant = f.keeper.register_variant(&f.owner, sku("CUP-250", None)).await.unwrap();
        assert_eq!(variant.low_stock_threshold(), DEFAULT_LOW_STOCK_THRESHOLD);

        let level = f.keeper.level(&f.staff, variant.id()).await.unwrap();
        assert_eq!(level.balance, 0);
        assert!(level.low_stock);
        assert_eq!(f.keeper.variant(&f.staff, variant.id()).await.unwrap(), variant);
    }

    #[tokio::test]
    async fn low_stock_flag_follows_the_balance() {
        let f = fixture();
        let id = f.keeper.register_variant(&f.owner, sku("CUP-250", Some(3))).await.unwrap().id();

        f.keeper.adjust(&f.owner, id, 4, Some("opening count".into())).await.unwrap();
        assert!(!f.keeper.level(&f.staff, id).await.unwrap().low_stock);

        f.keeper.adjust(&f.owner, id, -1, None).await.unwrap();
        let level = f.keeper.level(&f.staff, id).await.unwrap();
        assert_eq!(level.balance, 3);
        assert!(level.low_stock);

        let movements = f.keeper.movements(&f.staff, id).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert!(movements.iter().all(|m| m.movement_type == MovementType::Adjustment));
    }

    #[tokio::test]
    async fn staff_cannot_register_or_adjust() {
        let f = fixture();
        assert_eq!(
            f.keeper.register_variant(&f.staff, sku("CUP-250", None)).await.unwrap_err(),
            DomainError::forbidden("access denied")
        );

        let id = f.keeper.register_variant(&f.owner, sku("CUP-250", None)).await.unwrap().id();
        assert_eq!(
            f.keeper.adjust(&f.staff, id, 10, None).await.unwrap_err(),
            DomainError::forbidden("access denied")
        );
        assert_eq!(f.keeper.level(&f.owner, id).await.unwrap().balance, 0);
        assert!(f.keeper.movements(&f.owner, id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_skus_conflict() {
        let f = fixture();
        f.keeper.register_variant(&f.owner, sku("CUP-250", None)).await.unwrap();
        assert!(matches!(
            f.keeper.register_variant(&f.owner, sku(" CUP-250 ", None)).await,
            Err(DomainError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn unknown_and_foreign_variants_are_not_found() {
        let f = fixture();
        let unknown = VariantId::new();
        assert_eq!(
            f.keeper.level(&f.staff, unknown).await.unwrap_err(),
            DomainError::not_found("variant")
        );
        assert!(matches!(f.keeper.movements(&f.staff, unknown).await, Err(DomainError::NotFound(_))));
        assert!(matches!(f.keeper.adjust(&f.owner, unknown, 1, None).await, Err(DomainError::NotFound(_))));

        let id = f.keeper.register_variant(&f.owner, sku("CUP-250", None)).await.unwrap().id();
        let outsider = AuthContext::new(UserId::new(), BusinessId::new(), Role::Owner);
        assert!(matches!(f.keeper.variant(&outsider, id).await, Err(DomainError::NotFound(_))));
        assert!(matches!(f.keeper.adjust(&outsider, id, 1, None).await, Err(DomainError::NotFound(_))));
    }
}
