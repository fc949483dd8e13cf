//! Service wiring: one ledger store shared by every component.

use std::sync::Arc;

use stockledger_infra::{
    InMemoryLedgerStore, LedgerStore, PostgresLedgerStore, PurchaseOrderReconciler, SalesOrderLifecycle,
    StockKeeper,
};

use crate::config::DatabaseConfig;

pub type SharedStore = Arc<dyn LedgerStore>;

/// Application services shared by all handlers.
pub struct AppServices {
    pub stock: StockKeeper<SharedStore>,
    pub purchases: PurchaseOrderReconciler<SharedStore>,
    pub sales: SalesOrderLifecycle<SharedStore>,
}

impl AppServices {
    pub fn new(store: SharedStore) -> Self {
        Self {
            stock: StockKeeper::new(Arc::clone(&store)),
            purchases: PurchaseOrderReconciler::new(Arc::clone(&store)),
            sales: SalesOrderLifecycle::new(store),
        }
    }

    /// Services over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryLedgerStore::new()))
    }
}

/// Open the configured store: PostgreSQL when a URL is set, memory otherwise.
pub async fn build_store(database: &DatabaseConfig) -> anyhow::Result<SharedStore> {
    match database.url.as_deref() {
        Some(url) => {
            let store = PostgresLedgerStore::connect(url, &database.pool_settings()).await?;
            store.migrate().await?;
            tracing::info!(max_connections = database.max_connections, "using postgres ledger store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("no database url configured; ledger state lives in memory");
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
    }
}
