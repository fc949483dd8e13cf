use serde::{Deserialize, Serialize};

/// Something a caller wants to do.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    UpdateStatus,
    Receive,
    Confirm,
    Cancel,
    Adjust,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::UpdateStatus => "update_status",
            Action::Receive => "receive",
            Action::Confirm => "confirm",
            Action::Cancel => "cancel",
            Action::Adjust => "adjust",
        }
    }
}

/// What the action is performed on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    PurchaseOrder,
    SalesOrder,
    Stock,
    Variant,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::PurchaseOrder => "purchase_order",
            Resource::SalesOrder => "sales_order",
            Resource::Stock => "stock",
            Resource::Variant => "variant",
        }
    }
}

/// A `(resource, action)` pair, rendered as `"resource.action"`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

impl Permission {
    pub const fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.resource.as_str(), self.action.as_str())
    }
}
