use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, rejection::{JsonRejection, QueryRejection}},
    routing::{get, post},
    Json, Router,
};

use stockledger_auth::AuthContext;

use crate::app::dto::{self, CreateSalesOrderRequest, ListQuery, PageView, SalesOrderView};
use crate::app::errors::{ApiError, ApiResponse};
use crate::app::services::AppServices;

type Reply<T> = Result<ApiResponse<T>, ApiError>;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_sales_order).get(list_sales_orders))
        .route("/:id", get(get_sales_order))
        .route("/:id/confirm", post(confirm_sales_order))
        .route("/:id/cancel", post(cancel_sales_order))
}

pub async fn create_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    body: Result<Json<CreateSalesOrderRequest>, JsonRejection>,
) -> Reply<SalesOrderView> {
    let Json(body) = body?;
    let order = services.sales.create(&ctx, body.into_domain()?).await?;
    Ok(ApiResponse::created("Sales order created", order.into()))
}

pub async fn list_sales_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Reply<PageView<SalesOrderView>> {
    let Query(query) = query?;
    let page = services
        .sales
        .list(&ctx, query.sales_status()?, query.pagination())
        .await?;
    Ok(ApiResponse::ok("Sales orders fetched", PageView::from_page(page, SalesOrderView::from)))
}

pub async fn get_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Reply<SalesOrderView> {
    let order = services.sales.get(&ctx, dto::parse_sales_order_id(&id)?).await?;
    Ok(ApiResponse::ok("Sales order details fetched", order.into()))
}

pub async fn confirm_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Reply<SalesOrderView> {
    let order = services.sales.confirm(&ctx, dto::parse_sales_order_id(&id)?).await?;
    Ok(ApiResponse::ok("Sales order confirmed", order.into()))
}

pub async fn cancel_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Reply<SalesOrderView> {
    let order = services.sales.cancel(&ctx, dto::parse_sales_order_id(&id)?).await?;
    Ok(ApiResponse::ok("Sales order cancelled", order.into()))
}
