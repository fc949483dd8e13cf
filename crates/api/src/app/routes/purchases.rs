use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, rejection::{JsonRejection, QueryRejection}},
    routing::{get, patch, post},
    Json, Router,
};

use stockledger_auth::AuthContext;

use crate::app::dto::{
    self, CreatePurchaseOrderRequest, ListQuery, PageView, PurchaseOrderView, ReceivePurchaseOrderRequest,
    UpdateStatusRequest,
};
use crate::app::errors::{ApiError, ApiResponse};
use crate::app::services::AppServices;

type Reply<T> = Result<ApiResponse<T>, ApiError>;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_purchase_order).get(list_purchase_orders))
        .route("/:id", get(get_purchase_order))
        .route("/:id/status", patch(update_purchase_order_status))
        .route("/:id/receive", patch(receive_purchase_order))
}

pub async fn create_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    body: Result<Json<CreatePurchaseOrderRequest>, JsonRejection>,
) -> Reply<PurchaseOrderView> {
    let Json(body) = body?;
    let order = services.purchases.create(&ctx, body.into_domain()?).await?;
    Ok(ApiResponse::created("Purchase order created", order.into()))
}

pub async fn list_purchase_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Reply<PageView<PurchaseOrderView>> {
    let Query(query) = query?;
    let page = services
        .purchases
        .list(&ctx, query.purchase_status()?, query.pagination())
        .await?;
    Ok(ApiResponse::ok("Purchase orders fetched", PageView::from_page(page, PurchaseOrderView::from)))
}

pub async fn get_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Reply<PurchaseOrderView> {
    let order = services.purchases.get(&ctx, dto::parse_purchase_order_id(&id)?).await?;
    Ok(ApiResponse::ok("Purchase order details fetched", order.into()))
}

pub async fn update_purchase_order_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Reply<PurchaseOrderView> {
    let Json(body) = body?;
    let id = dto::parse_purchase_order_id(&id)?;
    let order = services.purchases.update_status(&ctx, id, body.status()?).await?;
    Ok(ApiResponse::ok("Purchase order status updated", order.into()))
}

pub async fn receive_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    body: Result<Json<ReceivePurchaseOrderRequest>, JsonRejection>,
) -> Reply<PurchaseOrderView> {
    let Json(body) = body?;
    let id = dto::parse_purchase_order_id(&id)?;
    let order = match body.into_domain()? {
        Some(items) => services.purchases.receive_partial(&ctx, id, &items).await?,
        None => services.purchases.force_receive_all(&ctx, id).await?,
    };
    Ok(ApiResponse::ok("Purchase order received", order.into()))
}
