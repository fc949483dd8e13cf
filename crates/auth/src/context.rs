use serde::{Deserialize, Serialize};

use stockledger_core::{BusinessId, UserId};

use crate::Role;

/// Identity and authorization context of a request.
///
/// Supplied by the upstream authentication layer and trusted verbatim: this
/// crate performs no authentication of its own. Every ledger-adjacent
/// operation is scoped to `business_id`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: UserId,
    pub business_id: BusinessId,
    pub role: Role,
}

impl AuthContext {
    pub fn new(user_id: UserId, business_id: BusinessId, role: Role) -> Self {
        Self {
            user_id,
            business_id,
            role,
        }
    }
}
