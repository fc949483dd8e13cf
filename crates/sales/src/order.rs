use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{
    AggregateId, BusinessId, Document, DomainError, DomainResult, MAX_QUANTITY, VariantId,
};

/// Sales order identifier (business-scoped via the document's `business_id`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalesOrderId(pub AggregateId);

impl SalesOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SalesOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Sales order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalesOrderStatus {
    Placed,
    Confirmed,
    Cancelled,
}

impl SalesOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalesOrderStatus::Placed => "PLACED",
            SalesOrderStatus::Confirmed => "CONFIRMED",
            SalesOrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "PLACED" => Ok(SalesOrderStatus::Placed),
            "CONFIRMED" => Ok(SalesOrderStatus::Confirmed),
            "CANCELLED" => Ok(SalesOrderStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown sales order status '{other}'"
            ))),
        }
    }
}

/// Order line: variant, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderItem {
    pub variant_id: VariantId,
    pub qty: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub sell_price: u64,
}

/// Input for [`SalesOrder::place`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSalesOrder {
    pub items: Vec<SalesOrderItem>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

/// Stock a transition moves: deducted on confirm, returned on cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub variant_id: VariantId,
    pub quantity: i64,
}

/// Document: SalesOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrder {
    id: SalesOrderId,
    business_id: BusinessId,
    status: SalesOrderStatus,
    items: Vec<SalesOrderItem>,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    notes: Option<String>,
    confirmed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SalesOrder {
    /// Place a new order. Nothing is deducted until it is confirmed.
    pub fn place(
        id: SalesOrderId,
        business_id: BusinessId,
        input: NewSalesOrder,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if input.items.is_empty() {
            return Err(DomainError::validation("invalid sales order data"));
        }
        if input.items.iter().any(|i| i.qty < 1) {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        if input.items.iter().any(|i| i.qty > MAX_QUANTITY) {
            return Err(DomainError::validation(format!("quantity must not exceed {MAX_QUANTITY}")));
        }

        Ok(Self {
            id,
            business_id,
            status: SalesOrderStatus::Placed,
            items: input.items,
            customer_name: trimmed(input.customer_name),
            customer_phone: trimmed(input.customer_phone),
            notes: trimmed(input.notes),
            confirmed_at: None,
            cancelled_at: None,
            created_at: at,
            updated_at: at,
        })
    }

    pub fn id_typed(&self) -> SalesOrderId {
        self.id
    }

    pub fn status(&self) -> SalesOrderStatus {
        self.status
    }

    pub fn items(&self) -> &[SalesOrderItem] {
        &self.items
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer_name.as_deref()
    }

    pub fn customer_phone(&self) -> Option<&str> {
        self.customer_phone.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// PLACED -> CONFIRMED. Returns the stock every line must deduct, in line order.
    pub fn confirm(&mut self, at: DateTime<Utc>) -> DomainResult<Vec<StockLine>> {
        if self.status != SalesOrderStatus::Placed {
            return Err(DomainError::invalid_state("order cannot be confirmed"));
        }

        self.status = SalesOrderStatus::Confirmed;
        self.confirmed_at = Some(at);
        self.updated_at = at;
        Ok(self.stock_lines())
    }

    /// PLACED | CONFIRMED -> CANCELLED.
    ///
    /// Returns the stock to give back: every line for a confirmed order,
    /// nothing for an order that was only placed.
    pub fn cancel(&mut self, at: DateTime<Utc>) -> DomainResult<Vec<StockLine>> {
        let returned = match self.status {
            SalesOrderStatus::Cancelled => {
                return Err(DomainError::invalid_state("order already cancelled"));
            }
            SalesOrderStatus::Confirmed => self.stock_lines(),
            SalesOrderStatus::Placed => Vec::new(),
        };

        self.status = SalesOrderStatus::Cancelled;
        self.cancelled_at = Some(at);
        self.updated_at = at;
        Ok(returned)
    }

    fn stock_lines(&self) -> Vec<StockLine> {
        self.items
            .iter()
            .map(|i| StockLine {
                variant_id: i.variant_id,
                quantity: i.qty,
            })
            .collect()
    }
}

impl Document for SalesOrder {
    type Id = SalesOrderId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn business_id(&self) -> BusinessId {
        self.business_id
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
