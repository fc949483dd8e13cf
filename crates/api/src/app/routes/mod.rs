use axum::Router;

pub mod purchases;
pub mod sales;
pub mod stock;
pub mod system;
pub mod variants;

/// Router for all business-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/purchase-orders", purchases::router())
        .nest("/sales-orders", sales::router())
        .nest("/stock", stock::router())
        .nest("/variants", variants::router())
}
