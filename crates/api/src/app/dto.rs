//! Request/response DTOs and their mapping to domain types.
//!
//! JSON uses camelCase field names. Request bodies reject unknown fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{AggregateId, Document, DomainResult, Page, Pagination, VariantId, Versioned};
use stockledger_infra::StockLevel;
use stockledger_inventory::{NewVariant, StockMovement, Variant};
use stockledger_purchasing::{
    NewPurchaseOrder, NewPurchaseOrderItem, PurchaseOrder, PurchaseOrderId, PurchaseOrderItem,
    PurchaseOrderStatus, ReceivedItem,
};
use stockledger_sales::{NewSalesOrder, SalesOrder, SalesOrderId, SalesOrderItem, SalesOrderStatus};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreatePurchaseOrderRequest {
    pub supplier_id: String,
    pub items: Vec<PurchaseOrderItemRequest>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PurchaseOrderItemRequest {
    pub variant_id: String,
    pub ordered_qty: i64,
    pub cost_price: u64,
}

impl CreatePurchaseOrderRequest {
    pub fn into_domain(self) -> DomainResult<NewPurchaseOrder> {
        let items = self
            .items
            .into_iter()
            .map(|item| {
                Ok(NewPurchaseOrderItem {
                    variant_id: item.variant_id.parse()?,
                    ordered_qty: item.ordered_qty,
                    cost_price: item.cost_price,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(NewPurchaseOrder {
            supplier_id: self.supplier_id,
            items,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: String,
}

impl UpdateStatusRequest {
    pub fn status(&self) -> DomainResult<PurchaseOrderStatus> {
        PurchaseOrderStatus::parse(self.status.trim())
    }
}

/// Receiving payload. Without `receivedItems` everything still open is received.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReceivePurchaseOrderRequest {
    pub received_items: Option<Vec<ReceivedItemRequest>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReceivedItemRequest {
    pub variant_id: String,
    pub qty: i64,
}

impl ReceivePurchaseOrderRequest {
    /// `None` asks for a full receipt.
    pub fn into_domain(self) -> DomainResult<Option<Vec<ReceivedItem>>> {
        self.received_items
            .map(|items| {
                items
                    .into_iter()
                    .map(|item| {
                        Ok(ReceivedItem {
                            variant_id: item.variant_id.parse()?,
                            qty: item.qty,
                        })
                    })
                    .collect()
            })
            .transpose()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateSalesOrderRequest {
    pub items: Vec<SalesOrderItemRequest>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SalesOrderItemRequest {
    pub variant_id: String,
    pub qty: i64,
    pub sell_price: u64,
}

impl CreateSalesOrderRequest {
    pub fn into_domain(self) -> DomainResult<NewSalesOrder> {
        let items = self
            .items
            .into_iter()
            .map(|item| {
                Ok(SalesOrderItem {
                    variant_id: item.variant_id.parse()?,
                    qty: item.qty,
                    sell_price: item.sell_price,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(NewSalesOrder {
            items,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdjustStockRequest {
    /// Signed delta.
    pub quantity: i64,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterVariantRequest {
    pub sku: String,
    pub low_stock_threshold: Option<i64>,
}

impl RegisterVariantRequest {
    pub fn into_domain(self) -> NewVariant {
        NewVariant {
            sku: self.sku,
            low_stock_threshold: self.low_stock_threshold,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

impl ListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }

    pub fn purchase_status(&self) -> DomainResult<Option<PurchaseOrderStatus>> {
        self.status.as_deref().map(PurchaseOrderStatus::parse).transpose()
    }

    pub fn sales_status(&self) -> DomainResult<Option<SalesOrderStatus>> {
        self.status.as_deref().map(SalesOrderStatus::parse).transpose()
    }
}

pub fn parse_purchase_order_id(raw: &str) -> DomainResult<PurchaseOrderId> {
    raw.parse::<AggregateId>().map(PurchaseOrderId::new)
}

pub fn parse_sales_order_id(raw: &str) -> DomainResult<SalesOrderId> {
    raw.parse::<AggregateId>().map(SalesOrderId::new)
}

pub fn parse_variant_id(raw: &str) -> DomainResult<VariantId> {
    raw.parse()
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView<T> {
    pub data: Vec<T>,
    pub pagination: PaginationView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationView {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> PageView<T> {
    pub fn from_page<D>(page: Page<D>, view: impl FnMut(D) -> T) -> Self {
        let pagination = PaginationView {
            total: page.total,
            page: page.page,
            limit: page.limit,
        };
        Self {
            data: page.items.into_iter().map(view).collect(),
            pagination,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderView {
    pub id: String,
    pub business_id: String,
    pub supplier_id: String,
    pub status: PurchaseOrderStatus,
    pub items: Vec<PurchaseOrderItemView>,
    pub notes: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderItemView {
    pub variant_id: String,
    pub ordered_qty: i64,
    pub received_qty: i64,
    pub cost_price: u64,
}

impl From<&PurchaseOrderItem> for PurchaseOrderItemView {
    fn from(item: &PurchaseOrderItem) -> Self {
        Self {
            variant_id: item.variant_id.to_string(),
            ordered_qty: item.ordered_qty,
            received_qty: item.received_qty,
            cost_price: item.cost_price,
        }
    }
}

impl From<Versioned<PurchaseOrder>> for PurchaseOrderView {
    fn from(stored: Versioned<PurchaseOrder>) -> Self {
        let order = &stored.document;
        Self {
            id: order.id_typed().to_string(),
            business_id: order.business_id().to_string(),
            supplier_id: order.supplier_id().to_string(),
            status: order.status(),
            items: order.items().iter().map(PurchaseOrderItemView::from).collect(),
            notes: order.notes().map(str::to_string),
            version: stored.version,
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrderView {
    pub id: String,
    pub business_id: String,
    pub status: SalesOrderStatus,
    pub items: Vec<SalesOrderItemView>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrderItemView {
    pub variant_id: String,
    pub qty: i64,
    pub sell_price: u64,
}

impl From<Versioned<SalesOrder>> for SalesOrderView {
    fn from(stored: Versioned<SalesOrder>) -> Self {
        let order = &stored.document;
        Self {
            id: order.id_typed().to_string(),
            business_id: order.business_id().to_string(),
            status: order.status(),
            items: order
                .items()
                .iter()
                .map(|item| SalesOrderItemView {
                    variant_id: item.variant_id.to_string(),
                    qty: item.qty,
                    sell_price: item.sell_price,
                })
                .collect(),
            customer_name: order.customer_name().map(str::to_string),
            customer_phone: order.customer_phone().map(str::to_string),
            notes: order.notes().map(str::to_string),
            confirmed_at: order.confirmed_at(),
            cancelled_at: order.cancelled_at(),
            version: stored.version,
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantView {
    pub id: String,
    pub sku: String,
    pub low_stock_threshold: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Variant> for VariantView {
    fn from(v: Variant) -> Self {
        Self {
            id: v.id().to_string(),
            sku: v.sku().to_string(),
            low_stock_threshold: v.low_stock_threshold(),
            created_at: v.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockBalanceView {
    pub variant_id: String,
    pub sku: String,
    pub balance: i64,
    pub low_stock_threshold: i64,
    pub low_stock: bool,
}

impl From<StockLevel> for StockBalanceView {
    fn from(level: StockLevel) -> Self {
        Self {
            variant_id: level.variant.id().to_string(),
            sku: level.variant.sku().to_string(),
            balance: level.balance,
            low_stock_threshold: level.variant.low_stock_threshold(),
            low_stock: level.low_stock,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementView {
    pub id: String,
    pub variant_id: String,
    #[serde(rename = "type")]
    pub movement_type: String,
    pub quantity: i64,
    pub reference_type: String,
    pub reference_id: Option<String>,
    pub note: Option<String>,
    pub sequence_number: u64,
    pub created_at: DateTime<Utc>,
}

impl From<StockMovement> for MovementView {
    fn from(m: StockMovement) -> Self {
        Self {
            id: m.id.to_string(),
            variant_id: m.variant_id.to_string(),
            movement_type: m.movement_type.as_str().to_string(),
            quantity: m.quantity,
            reference_type: m.reference_type.as_str().to_string(),
            reference_id: m.reference_id.map(|id| id.to_string()),
            note: m.note,
            sequence_number: m.sequence_number,
            created_at: m.created_at,
        }
    }
}
