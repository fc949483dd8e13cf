//! Application services over a [`LedgerStore`](crate::store::LedgerStore).
//!
//! Order components never build movements themselves: they compute what a
//! transition moves, stage it through [`StockLedgerService`], and commit it
//! together with the order document.

pub mod ledger;
pub mod purchasing;
pub mod sales;
pub mod stock;

pub use ledger::StockLedgerService;
pub use purchasing::PurchaseOrderReconciler;
pub use sales::SalesOrderLifecycle;
pub use stock::{StockKeeper, StockLevel};
