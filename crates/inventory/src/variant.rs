use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{BusinessId, DomainError, DomainResult, MAX_QUANTITY, VariantId};

pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Input for registering a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVariant {
    pub sku: String,
    /// Defaults to [`DEFAULT_LOW_STOCK_THRESHOLD`].
    pub low_stock_threshold: Option<i64>,
}

/// A stock-keeping unit of one business.
///
/// Movements and order lines may only reference registered variants. The
/// SKU is unique within the owning business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    id: VariantId,
    business_id: BusinessId,
    sku: String,
    low_stock_threshold: i64,
    created_at: DateTime<Utc>,
}

impl Variant {
    pub fn register(
        id: VariantId,
        business_id: BusinessId,
        input: NewVariant,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let sku = input.sku.trim().to_string();
        if sku.is_empty() {
            return Err(DomainError::validation("variant sku is required"));
        }

        let low_stock_threshold = input.low_stock_threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
        if !(0..=MAX_QUANTITY).contains(&low_stock_threshold) {
            return Err(DomainError::validation(format!(
                "low stock threshold must be between 0 and {MAX_QUANTITY}"
            )));
        }

        Ok(Self {
            id,
            business_id,
            sku,
            low_stock_threshold,
            created_at: now,
        })
    }

    pub fn id(&self) -> VariantId {
        self.id
    }

    pub fn business_id(&self) -> BusinessId {
        self.business_id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn low_stock_threshold(&self) -> i64 {
        self.low_stock_threshold
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// A balance at or below the threshold counts as low.
    pub fn is_low_stock(&self, balance: i64) -> bool {
        balance <= self.low_stock_threshold
    }
}
