//! Purchasing domain module (purchase orders and receipt reconciliation).
//!
//! This crate contains business rules for purchase orders, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Stock is never
//! touched here: reconciliation returns [`Receipt`]s that the ledger books.

pub mod order;

pub use order::{
    NewPurchaseOrder, NewPurchaseOrderItem, PurchaseOrder, PurchaseOrderId, PurchaseOrderItem,
    PurchaseOrderStatus, Receipt, ReceivedItem,
};
