use axum::{extract::Request, middleware::Next, response::Response};

use crate::app::errors::ApiError;
use crate::context::auth_context_from_headers;

/// Attach the caller's [`AuthContext`](stockledger_auth::AuthContext) to the
/// request, or answer 401 before any handler runs.
pub async fn identity_middleware(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let ctx = auth_context_from_headers(req.headers()).map_err(|e| {
        tracing::debug!(reason = %e, path = %req.uri().path(), "request without identity");
        ApiError::unauthorized(e.to_string())
    })?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
