use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{AggregateId, BusinessId, DomainError, DomainResult, MAX_QUANTITY, VariantId};

/// Stock movement identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(pub AggregateId);

impl MovementId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for MovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Direction of a movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Adjustment => "ADJUSTMENT",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "IN" => Ok(MovementType::In),
            "OUT" => Ok(MovementType::Out),
            "ADJUSTMENT" => Ok(MovementType::Adjustment),
            other => Err(DomainError::validation(format!("unknown movement type '{other}'"))),
        }
    }
}

/// Provenance of a movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    PurchaseOrder,
    SalesOrder,
    Return,
    Manual,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::PurchaseOrder => "PURCHASE_ORDER",
            ReferenceType::SalesOrder => "SALES_ORDER",
            ReferenceType::Return => "RETURN",
            ReferenceType::Manual => "MANUAL",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "PURCHASE_ORDER" => Ok(ReferenceType::PurchaseOrder),
            "SALES_ORDER" => Ok(ReferenceType::SalesOrder),
            "RETURN" => Ok(ReferenceType::Return),
            "MANUAL" => Ok(ReferenceType::Manual),
            other => Err(DomainError::validation(format!("unknown reference type '{other}'"))),
        }
    }
}

/// References allowed on an `OUT` movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundReference {
    SalesOrder,
    Return,
}

impl From<OutboundReference> for ReferenceType {
    fn from(value: OutboundReference) -> Self {
        match value {
            OutboundReference::SalesOrder => ReferenceType::SalesOrder,
            OutboundReference::Return => ReferenceType::Return,
        }
    }
}

/// References allowed on an `IN` movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundReference {
    PurchaseOrder,
    Return,
}

impl From<InboundReference> for ReferenceType {
    fn from(value: InboundReference) -> Self {
        match value {
            InboundReference::PurchaseOrder => ReferenceType::PurchaseOrder,
            InboundReference::Return => ReferenceType::Return,
        }
    }
}

/// One committed, immutable stock event.
///
/// `quantity` is stored as recorded: positive for `IN`/`OUT`, signed for
/// `ADJUSTMENT`. `sequence_number` is assigned by the log on append and
/// defines the total order of the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub business_id: BusinessId,
    pub variant_id: VariantId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reference_type: ReferenceType,
    pub reference_id: Option<AggregateId>,
    pub note: Option<String>,
    pub sequence_number: u64,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Materialize a draft once the log has assigned its position.
    pub fn from_draft(
        draft: MovementDraft,
        id: MovementId,
        sequence_number: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            business_id: draft.business_id,
            variant_id: draft.variant_id,
            movement_type: draft.movement_type,
            quantity: draft.quantity,
            reference_type: draft.reference_type,
            reference_id: draft.reference_id,
            note: draft.note,
            sequence_number,
            created_at,
        }
    }

    /// Contribution of this movement to the derived balance.
    pub fn signed_quantity(&self) -> i64 {
        crate::balance::signed_quantity(self.movement_type, self.quantity)
    }
}

/// A validated movement that has not been appended yet.
///
/// Drafts can only be built through the constructors below, which enforce the
/// per-type quantity rules. Fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDraft {
    business_id: BusinessId,
    variant_id: VariantId,
    movement_type: MovementType,
    quantity: i64,
    reference_type: ReferenceType,
    reference_id: Option<AggregateId>,
    note: Option<String>,
}

impl MovementDraft {
    /// `OUT` movement. Guarded: it is only appended if the resulting balance
    /// stays non-negative.
    pub fn outbound(
        business_id: BusinessId,
        variant_id: VariantId,
        quantity: i64,
        reference: OutboundReference,
        reference_id: AggregateId,
    ) -> DomainResult<Self> {
        ensure_quantity(quantity)?;
        Ok(Self {
            business_id,
            variant_id,
            movement_type: MovementType::Out,
            quantity,
            reference_type: reference.into(),
            reference_id: Some(reference_id),
            note: None,
        })
    }

    /// `IN` movement. Never guarded.
    pub fn inbound(
        business_id: BusinessId,
        variant_id: VariantId,
        quantity: i64,
        reference: InboundReference,
        reference_id: AggregateId,
    ) -> DomainResult<Self> {
        ensure_quantity(quantity)?;
        Ok(Self {
            business_id,
            variant_id,
            movement_type: MovementType::In,
            quantity,
            reference_type: reference.into(),
            reference_id: Some(reference_id),
            note: None,
        })
    }

    /// `ADJUSTMENT` movement carrying a signed delta. Not guarded: manual
    /// adjustments may take the balance below zero.
    pub fn adjustment(
        business_id: BusinessId,
        variant_id: VariantId,
        delta: i64,
        note: Option<String>,
    ) -> DomainResult<Self> {
        if delta == 0 {
            return Err(DomainError::validation("adjustment quantity is required"));
        }
        if delta.unsigned_abs() > MAX_QUANTITY.unsigned_abs() {
            return Err(quantity_too_large());
        }
        let note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        Ok(Self {
            business_id,
            variant_id,
            movement_type: MovementType::Adjustment,
            quantity: delta,
            reference_type: ReferenceType::Manual,
            reference_id: None,
            note,
        })
    }

    pub fn business_id(&self) -> BusinessId {
        self.business_id
    }

    pub fn variant_id(&self) -> VariantId {
        self.variant_id
    }

    pub fn movement_type(&self) -> MovementType {
        self.movement_type
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn reference_type(&self) -> ReferenceType {
        self.reference_type
    }

    pub fn reference_id(&self) -> Option<AggregateId> {
        self.reference_id
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn signed_quantity(&self) -> i64 {
        crate::balance::signed_quantity(self.movement_type, self.quantity)
    }

    /// Whether appending this draft requires a non-negative resulting balance.
    pub fn is_guarded(&self) -> bool {
        self.movement_type == MovementType::Out
    }
}

fn ensure_quantity(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantity must be greater than zero"));
    }
    if quantity > MAX_QUANTITY {
        return Err(quantity_too_large());
    }
    Ok(())
}

fn quantity_too_large() -> DomainError {
    DomainError::validation(format!("quantity must not exceed {MAX_QUANTITY}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (BusinessId, VariantId, AggregateId) {
        (BusinessId::new(), VariantId::new(), AggregateId::new())
    }

    #[test]
    fn outbound_rejects_non_positive_quantity() {
        let (b, v, r) = ids();
        for qty in [0, -3] {
            let err = MovementDraft::outbound(b, v, qty, OutboundReference::SalesOrder, r).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn inbound_maps_reference_and_is_not_guarded() {
        let (b, v, r) = ids();
        let draft = MovementDraft::inbound(b, v, 4, InboundReference::Return, r).unwrap();
        assert_eq!(draft.movement_type(), MovementType::In);
        assert_eq!(draft.reference_type(), ReferenceType::Return);
        assert_eq!(draft.reference_id(), Some(r));
        assert!(!draft.is_guarded());
    }

    #[test]
    fn outbound_is_guarded() {
        let (b, v, r) = ids();
        let draft = MovementDraft::outbound(b, v, 2, OutboundReference::SalesOrder, r).unwrap();
        assert!(draft.is_guarded());
        assert_eq!(draft.signed_quantity(), -2);
    }

    #[test]
    fn adjustment_keeps_sign_and_trims_note() {
        let (b, v, _) = ids();
        let draft = MovementDraft::adjustment(b, v, -7, Some("  shrinkage ".into())).unwrap();
        assert_eq!(draft.quantity(), -7);
        assert_eq!(draft.signed_quantity(), -7);
        assert_eq!(draft.reference_type(), ReferenceType::Manual);
        assert_eq!(draft.note(), Some("shrinkage"));
        assert!(!draft.is_guarded());
    }

    #[test]
    fn adjustment_requires_non_zero_delta() {
        let (b, v, _) = ids();
        let err = MovementDraft::adjustment(b, v, 0, None).unwrap_err();
        assert_eq!(err, DomainError::validation("adjustment quantity is required"));
    }

    #[test]
    fn quantities_are_bounded_in_both_directions() {
        let (b, v, r) = ids();
        assert!(MovementDraft::inbound(b, v, MAX_QUANTITY, InboundReference::Return, r).is_ok());
        assert!(MovementDraft::adjustment(b, v, -MAX_QUANTITY, None).is_ok());

        let too_large = [
            MovementDraft::inbound(b, v, MAX_QUANTITY + 1, InboundReference::Return, r),
            MovementDraft::outbound(b, v, i64::MAX, OutboundReference::SalesOrder, r),
            MovementDraft::adjustment(b, v, i64::MAX, None),
            MovementDraft::adjustment(b, v, i64::MIN, None),
        ];
        for draft in too_large {
            assert!(matches!(draft, Err(DomainError::Validation(_))));
        }
    }

    #[test]
    fn blank_note_is_dropped() {
        let (b, v, _) = ids();
        let draft = MovementDraft::adjustment(b, v, 1, Some("   ".into())).unwrap();
        assert_eq!(draft.note(), None);
    }

    #[test]
    fn type_names_parse_back() {
        for t in [MovementType::In, MovementType::Out, MovementType::Adjustment] {
            assert_eq!(MovementType::parse(t.as_str()).unwrap(), t);
        }
        for r in [
            ReferenceType::PurchaseOrder,
            ReferenceType::SalesOrder,
            ReferenceType::Return,
            ReferenceType::Manual,
        ] {
            assert_eq!(ReferenceType::parse(r.as_str()).unwrap(), r);
        }
    }
}
