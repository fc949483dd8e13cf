use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{
    AggregateId, BusinessId, Document, DomainError, DomainResult, MAX_QUANTITY, VariantId,
};

/// Purchase order identifier (business-scoped via the document's `business_id`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub AggregateId);

impl PurchaseOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase order status lifecycle.
///
/// `DRAFT` is initial-only. The remaining statuses only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Draft,
    Sent,
    Confirmed,
    Received,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "DRAFT",
            PurchaseOrderStatus::Sent => "SENT",
            PurchaseOrderStatus::Confirmed => "CONFIRMED",
            PurchaseOrderStatus::Received => "RECEIVED",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "DRAFT" => Ok(PurchaseOrderStatus::Draft),
            "SENT" => Ok(PurchaseOrderStatus::Sent),
            "CONFIRMED" => Ok(PurchaseOrderStatus::Confirmed),
            "RECEIVED" => Ok(PurchaseOrderStatus::Received),
            other => Err(DomainError::validation(format!(
                "unknown purchase order status '{other}'"
            ))),
        }
    }

    fn rank(self) -> u8 {
        match self {
            PurchaseOrderStatus::Draft => 0,
            PurchaseOrderStatus::Sent => 1,
            PurchaseOrderStatus::Confirmed => 2,
            PurchaseOrderStatus::Received => 3,
        }
    }
}

impl core::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purchase order line item.
///
/// `cost_price` is in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub variant_id: VariantId,
    pub ordered_qty: i64,
    pub received_qty: i64,
    pub cost_price: u64,
}

impl PurchaseOrderItem {
    pub fn remaining(&self) -> i64 {
        self.ordered_qty - self.received_qty
    }
}

/// Line of a new purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseOrderItem {
    pub variant_id: VariantId,
    pub ordered_qty: i64,
    pub cost_price: u64,
}

/// Input for [`PurchaseOrder::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub supplier_id: String,
    pub items: Vec<NewPurchaseOrderItem>,
    pub notes: Option<String>,
}

/// One `{variant, qty}` entry of a receiving payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedItem {
    pub variant_id: VariantId,
    pub qty: i64,
}

/// Stock that must be booked in because a receive call accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub variant_id: VariantId,
    pub quantity: i64,
}

/// Document: PurchaseOrder.
///
/// Invariant: `0 <= received_qty <= ordered_qty` for every item. Mutating
/// methods either apply completely or leave the order untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    business_id: BusinessId,
    supplier_id: String,
    status: PurchaseOrderStatus,
    items: Vec<PurchaseOrderItem>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    /// Create a new DRAFT order with nothing received.
    pub fn create(
        id: PurchaseOrderId,
        business_id: BusinessId,
        input: NewPurchaseOrder,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let supplier_id = input.supplier_id.trim().to_string();
        if supplier_id.is_empty() || input.items.is_empty() {
            return Err(DomainError::validation("invalid purchase order data"));
        }
        if input.items.iter().any(|i| i.ordered_qty < 1) {
            return Err(DomainError::validation("ordered quantity must be at least 1"));
        }
        if input.items.iter().any(|i| i.ordered_qty > MAX_QUANTITY) {
            return Err(DomainError::validation(format!(
                "ordered quantity must not exceed {MAX_QUANTITY}"
            )));
        }

        let items = input
            .items
            .into_iter()
            .map(|i| PurchaseOrderItem {
                variant_id: i.variant_id,
                ordered_qty: i.ordered_qty,
                received_qty: 0,
                cost_price: i.cost_price,
            })
            .collect();

        Ok(Self {
            id,
            business_id,
            supplier_id,
            status: PurchaseOrderStatus::Draft,
            items,
            notes: input.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            created_at: at,
            updated_at: at,
        })
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn supplier_id(&self) -> &str {
        &self.supplier_id
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn items(&self) -> &[PurchaseOrderItem] {
        &self.items
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_fully_received(&self) -> bool {
        self.items.iter().all(|i| i.received_qty == i.ordered_qty)
    }

    /// Receive every outstanding quantity and mark the order RECEIVED.
    ///
    /// Returns one receipt per line that still had something outstanding.
    pub fn receive_all(&mut self, at: DateTime<Utc>) -> DomainResult<Vec<Receipt>> {
        self.ensure_not_received()?;

        let mut receipts = Vec::new();
        for item in &mut self.items {
            let remaining = item.remaining();
            if remaining > 0 {
                receipts.push(Receipt {
                    variant_id: item.variant_id,
                    quantity: remaining,
                });
                item.received_qty = item.ordered_qty;
            }
        }

        self.status = PurchaseOrderStatus::Received;
        self.updated_at = at;
        Ok(receipts)
    }

    /// Reconcile a receiving payload against the ordered quantities.
    ///
    /// Entries whose variant matches no line are skipped. An entry that
    /// exceeds its line's outstanding quantity rejects the whole payload.
    /// The order flips to RECEIVED once every line is complete.
    pub fn receive_partial(
        &mut self,
        received: &[ReceivedItem],
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<Receipt>> {
        if self.status == PurchaseOrderStatus::Received {
            return Err(DomainError::validation("purchase order already received"));
        }

        let mut items = self.items.clone();
        let mut receipts = Vec::new();

        for entry in received {
            if entry.qty <= 0 {
                return Err(DomainError::validation("quantity must be greater than zero"));
            }
            let Some(item) = items.iter_mut().find(|i| i.variant_id == entry.variant_id) else {
                continue;
            };
            if entry.qty > item.remaining() {
                return Err(DomainError::validation(
                    "received quantity exceeds ordered quantity",
                ));
            }
            item.received_qty += entry.qty;
            receipts.push(Receipt {
                variant_id: entry.variant_id,
                quantity: entry.qty,
            });
        }

        self.items = items;
        if self.is_fully_received() {
            self.status = PurchaseOrderStatus::Received;
        }
        self.updated_at = at;
        Ok(receipts)
    }

    /// Explicit status change.
    ///
    /// Targeting RECEIVED is the same as [`PurchaseOrder::receive_all`]; any
    /// other target returns no receipts.
    pub fn transition(
        &mut self,
        target: PurchaseOrderStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<Receipt>> {
        match target {
            PurchaseOrderStatus::Draft => Err(DomainError::validation("invalid status transition")),
            PurchaseOrderStatus::Received => self.receive_all(at),
            PurchaseOrderStatus::Sent | PurchaseOrderStatus::Confirmed => {
                self.ensure_not_received()?;
                if target.rank() <= self.status.rank() {
                    return Err(DomainError::invalid_state(format!(
                        "cannot move purchase order from {} to {}",
                        self.status, target
                    )));
                }
                self.status = target;
                self.updated_at = at;
                Ok(Vec::new())
            }
        }
    }

    fn ensure_not_received(&self) -> DomainResult<()> {
        if self.status == PurchaseOrderStatus::Received {
            return Err(DomainError::invalid_state("purchase order already received"));
        }
        Ok(())
    }
}

impl Document for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn business_id(&self) -> BusinessId {
        self.business_id
    }
}
