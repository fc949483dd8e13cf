use axum::http::HeaderMap;

use stockledger_auth::{AuthContext, Role};
use stockledger_core::{BusinessId, UserId};

/// Headers set by the upstream authentication layer.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const BUSINESS_ID_HEADER: &str = "x-business-id";
pub const ROLE_HEADER: &str = "x-role";

/// Why a request carries no usable identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    Missing(&'static str),
    Malformed(&'static str),
}

impl core::fmt::Display for ContextError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ContextError::Missing(header) => write!(f, "missing {header} header"),
            ContextError::Malformed(header) => write!(f, "malformed {header} header"),
        }
    }
}

/// Read the caller's identity from request headers.
///
/// The values are trusted verbatim; nothing here authenticates them.
pub fn auth_context_from_headers(headers: &HeaderMap) -> Result<AuthContext, ContextError> {
    let user_id: UserId = parse_header(headers, USER_ID_HEADER)?;
    let business_id: BusinessId = parse_header(headers, BUSINESS_ID_HEADER)?;
    let role: Role = parse_header(headers, ROLE_HEADER)?;
    Ok(AuthContext::new(user_id, business_id, role))
}

fn parse_header<T: core::str::FromStr>(headers: &HeaderMap, name: &'static str) -> Result<T, ContextError> {
    let value = headers.get(name).ok_or(ContextError::Missing(name))?;
    let value = value.to_str().map_err(|_| ContextError::Malformed(name))?.trim();
    if value.is_empty() {
        return Err(ContextError::Missing(name));
    }
    value.parse().map_err(|_| ContextError::Malformed(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(user: &str, business: &str, role: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(USER_ID_HEADER, HeaderValue::from_str(user).unwrap());
        map.insert(BUSINESS_ID_HEADER, HeaderValue::from_str(business).unwrap());
        map.insert(ROLE_HEADER, HeaderValue::from_str(role).unwrap());
        map
    }

    #[test]
    fn well_formed_headers_yield_a_context() {
        let (user, business) = (UserId::new(), BusinessId::new());
        let ctx = auth_context_from_headers(&headers(&user.to_string(), &business.to_string(), "manager")).unwrap();
        assert_eq!(ctx, AuthContext::new(user, business, Role::Manager));
    }

    #[test]
    fn missing_or_bad_values_are_reported_by_header() {
        assert_eq!(
            auth_context_from_headers(&HeaderMap::new()),
            Err(ContextError::Missing(USER_ID_HEADER))
        );

        let user = UserId::new().to_string();
        assert_eq!(
            auth_context_from_headers(&headers(&user, "not-a-uuid", "OWNER")),
            Err(ContextError::Malformed(BUSINESS_ID_HEADER))
        );
        assert_eq!(
            auth_context_from_headers(&headers(&user, &BusinessId::new().to_string(), "admin")),
            Err(ContextError::Malformed(ROLE_HEADER))
        );
    }
}
