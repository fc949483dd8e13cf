//! Infrastructure layer: storage adapters and the stock ledger services.

pub mod services;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use services::{
    PurchaseOrderReconciler, SalesOrderLifecycle, StockKeeper, StockLedgerService, StockLevel,
};
pub use store::postgres::PoolSettings;
pub use store::{
    ChangeSet, Committed, DocumentWrite, InMemoryLedgerStore, LedgerStore, PostgresLedgerStore,
    StoreError,
};
