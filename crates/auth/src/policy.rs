use serde::Serialize;
use thiserror::Error;

use stockledger_core::DomainError;

use crate::{Action, AuthContext, Permission, Resource, Role};

/// Outcome of a policy evaluation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("access denied: role {role} may not perform '{permission}'")]
    Forbidden { role: Role, permission: Permission },
}

impl From<AuthzError> for DomainError {
    fn from(_: AuthzError) -> Self {
        DomainError::forbidden("access denied")
    }
}

/// Single policy entry point: may `role` perform `action` on `resource`?
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn evaluate(role: Role, action: Action, resource: Resource) -> Decision {
    let allowed = match (resource, action) {
        (_, Action::Read) => true,
        (Resource::SalesOrder, Action::Create) => true,
        (Resource::PurchaseOrder, Action::Receive) => true,
        (Resource::PurchaseOrder, Action::Create | Action::UpdateStatus)
        | (Resource::SalesOrder, Action::Confirm | Action::Cancel)
        | (Resource::Stock, Action::Adjust)
        | (Resource::Variant, Action::Create) => matches!(role, Role::Owner | Role::Manager),
        _ => false,
    };

    if allowed { Decision::Allow } else { Decision::Deny }
}

/// Authorize the caller's role for an action within its own business.
pub fn authorize(ctx: &AuthContext, action: Action, resource: Resource) -> Result<(), AuthzError> {
    match evaluate(ctx.role, action, resource) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            tracing::debug!(
                explanation = ?explain(ctx.role, action, resource),
                business_id = %ctx.business_id,
                user_id = %ctx.user_id,
                "authorization denied"
            );
            Err(AuthzError::Forbidden {
                role: ctx.role,
                permission: Permission::new(resource, action),
            })
        }
    }
}

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub permission: String,
    pub role: Role,
    pub decision: Decision,
    /// Roles that would be allowed to perform the same action.
    pub allowed_roles: Vec<Role>,
}

/// Explain why an authorization decision was made (or would be made).
pub fn explain(role: Role, action: Action, resource: Resource) -> AuthorizationExplanation {
    AuthorizationExplanation {
        permission: Permission::new(resource, action).to_string(),
        role,
        decision: evaluate(role, action, resource),
        allowed_roles: Role::ALL
            .into_iter()
            .filter(|r| evaluate(*r, action, resource).is_allowed())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::{BusinessId, UserId};

    fn ctx(role: Role) -> AuthContext {
        AuthContext::new(UserId::new(), BusinessId::new(), role)
    }

    #[test]
    fn everyone_can_read() {
        for role in Role::ALL {
            for resource in [
                Resource::PurchaseOrder,
                Resource::SalesOrder,
                Resource::Stock,
                Resource::Variant,
            ] {
                assert!(evaluate(role, Action::Read, resource).is_allowed());
            }
        }
    }

    #[test]
    fn staff_cannot_confirm_or_cancel_sales_orders() {
        assert_eq!(evaluate(Role::Staff, Action::Confirm, Resource::SalesOrder), Decision::Deny);
        assert_eq!(evaluate(Role::Staff, Action::Cancel, Resource::SalesOrder), Decision::Deny);
        assert_eq!(evaluate(Role::Manager, Action::Confirm, Resource::SalesOrder), Decision::Allow);
    }

    #[test]
    fn staff_can_place_sales_orders_and_receive_goods() {
        assert!(evaluate(Role::Staff, Action::Create, Resource::SalesOrder).is_allowed());
        assert!(evaluate(Role::Staff, Action::Receive, Resource::PurchaseOrder).is_allowed());
    }

    #[test]
    fn staff_cannot_create_purchase_orders_or_adjust_stock() {
        assert!(authorize(&ctx(Role::Staff), Action::Create, Resource::PurchaseOrder).is_err());
        assert!(authorize(&ctx(Role::Staff), Action::Adjust, Resource::Stock).is_err());
        assert!(authorize(&ctx(Role::Owner), Action::Adjust, Resource::Stock).is_ok());
    }

    #[test]
    fn only_owners_and_managers_register_variants() {
        let explanation = explain(Role::Staff, Action::Create, Resource::Variant);
        assert_eq!(explanation.permission, "variant.create");
        assert_eq!(explanation.decision, Decision::Deny);
        assert_eq!(explanation.allowed_roles, vec![Role::Owner, Role::Manager]);
    }

    #[test]
    fn unknown_combinations_are_denied() {
        assert_eq!(evaluate(Role::Owner, Action::Confirm, Resource::Stock), Decision::Deny);
        assert_eq!(evaluate(Role::Owner, Action::Adjust, Resource::SalesOrder), Decision::Deny);
    }

    #[test]
    fn denial_maps_to_forbidden_domain_error() {
        let err: DomainError = authorize(&ctx(Role::Staff), Action::UpdateStatus, Resource::PurchaseOrder)
            .unwrap_err()
            .into();
        assert_eq!(err, DomainError::forbidden("access denied"));
    }

    #[test]
    fn explanation_lists_allowed_roles() {
        let explanation = explain(Role::Staff, Action::Cancel, Resource::SalesOrder);
        assert_eq!(explanation.permission, "sales_order.cancel");
        assert_eq!(explanation.decision, Decision::Deny);
        assert_eq!(explanation.allowed_roles, vec![Role::Owner, Role::Manager]);
    }
}
