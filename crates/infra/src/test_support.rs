use chrono::Utc;

use stockledger_core::{BusinessId, VariantId};
use stockledger_inventory::{NewVariant, Variant};

use crate::store::LedgerStore;

/// Register a fresh variant with a unique SKU and the default threshold.
pub(crate) async fn registered_variant<S: LedgerStore + ?Sized>(store: &S, business_id: BusinessId) -> VariantId {
    let id = VariantId::new();
    let variant = Variant::register(
        id,
        business_id,
        NewVariant {
            sku: format!("SKU-{id}"),
            low_stock_threshold: None,
        },
        Utc::now(),
    )
    .expect("valid variant");
    store.register_variant(variant).await.expect("register variant");
    id
}
