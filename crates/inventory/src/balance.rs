//! Derived balances and guard admission.
//!
//! A balance is never stored. It is the fold of all movements of one
//! `(business, variant)` pair: `+q` for `IN`, `-q` for `OUT`, and the signed
//! delta for `ADJUSTMENT`.

use std::collections::{BTreeSet, HashMap};

use stockledger_core::{BusinessId, DomainError, VariantId};

use crate::movement::{MovementDraft, MovementType, StockMovement};

/// Key of one independently tracked balance.
pub type StockKey = (BusinessId, VariantId);

/// Contribution of a movement of `movement_type` and recorded `quantity`.
pub fn signed_quantity(movement_type: MovementType, quantity: i64) -> i64 {
    match movement_type {
        MovementType::In | MovementType::Adjustment => quantity,
        MovementType::Out => -quantity,
    }
}

/// Fold movements into a balance. An empty log yields `Some(0)`; `None`
/// means the sum left the `i64` range.
pub fn fold_balance<'a>(movements: impl IntoIterator<Item = &'a StockMovement>) -> Option<i64> {
    movements
        .into_iter()
        .try_fold(0i64, |acc, m| acc.checked_add(m.signed_quantity()))
}

/// A guarded draft that would have driven its balance negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub business_id: BusinessId,
    pub variant_id: VariantId,
    /// Running balance just before the rejected draft.
    pub available: i64,
    pub requested: i64,
}

impl From<Shortfall> for DomainError {
    fn from(value: Shortfall) -> Self {
        DomainError::insufficient_stock(value.variant_id, value.available, value.requested)
    }
}

/// Why a set of drafts was not admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Shortfall(Shortfall),
    /// Applying a draft would take the running balance outside the `i64` range.
    OutOfRange {
        business_id: BusinessId,
        variant_id: VariantId,
    },
}

impl From<Rejection> for DomainError {
    fn from(value: Rejection) -> Self {
        match value {
            Rejection::Shortfall(shortfall) => shortfall.into(),
            Rejection::OutOfRange { variant_id, .. } => {
                DomainError::validation(format!("balance of variant {variant_id} is out of range"))
            }
        }
    }
}

/// Keys whose opening balance must be known (and locked) before `drafts` can
/// be admitted. Sorted, so stores can lock them in a stable order.
pub fn guarded_keys(drafts: &[MovementDraft]) -> BTreeSet<StockKey> {
    drafts
        .iter()
        .filter(|d| d.is_guarded())
        .map(|d| (d.business_id(), d.variant_id()))
        .collect()
}

/// Admit `drafts` in order against running balances.
///
/// `opening` must hold the current balance of every key from
/// [`guarded_keys`]; missing keys count as 0. Every guarded draft must leave
/// its running balance at or above zero. Drafts on the same key accumulate,
/// so two lines of one order that share a variant are checked together.
/// Arithmetic is checked: a draft that would overflow its balance is rejected
/// with [`Rejection::OutOfRange`], guarded or not.
pub fn admit(opening: &HashMap<StockKey, i64>, drafts: &[MovementDraft]) -> Result<(), Rejection> {
    let mut running: HashMap<StockKey, i64> = HashMap::new();

    for draft in drafts {
        let key = (draft.business_id(), draft.variant_id());
        let balance = running
            .entry(key)
            .or_insert_with(|| opening.get(&key).copied().unwrap_or(0));

        let next = balance
            .checked_add(draft.signed_quantity())
            .ok_or(Rejection::OutOfRange {
                business_id: key.0,
                variant_id: key.1,
            })?;
        if draft.is_guarded() && next < 0 {
            return Err(Rejection::Shortfall(Shortfall {
                business_id: key.0,
                variant_id: key.1,
                available: *balance,
                requested: draft.quantity(),
            }));
        }
        *balance = next;
    }

    Ok(())
}
