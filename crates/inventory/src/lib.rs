//! Inventory domain module: the stock movement ledger.
//!
//! This crate contains the ledger models and the balance rules, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod balance;
pub mod movement;
pub mod variant;

pub use balance::{
    Rejection, Shortfall, StockKey, admit, fold_balance, guarded_keys, signed_quantity,
};
pub use movement::{
    InboundReference, MovementDraft, MovementId, MovementType, OutboundReference, ReferenceType,
    StockMovement,
};
pub use variant::{DEFAULT_LOW_STOCK_THRESHOLD, NewVariant, Variant};
