use std::sync::Arc;

use axum::{
    extract::{Extension, Path, rejection::JsonRejection},
    routing::{get, post},
    Json, Router,
};

use stockledger_auth::AuthContext;

use crate::app::dto::{self, AdjustStockRequest, MovementView, StockBalanceView};
use crate::app::errors::{ApiError, ApiResponse};
use crate::app::services::AppServices;

type Reply<T> = Result<ApiResponse<T>, ApiError>;

pub fn router() -> Router {
    Router::new()
        .route("/:variant_id", get(get_balance))
        .route("/:variant_id/movements", get(list_movements))
        .route("/:variant_id/adjust", post(adjust_stock))
}

pub async fn get_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(variant_id): Path<String>,
) -> Reply<StockBalanceView> {
    let variant_id = dto::parse_variant_id(&variant_id)?;

    let level = services.stock.level(&ctx, variant_id).await?;
    Ok(ApiResponse::ok("Stock balance fetched", level.into()))
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(variant_id): Path<String>,
) -> Reply<Vec<MovementView>> {
    let variant_id = dto::parse_variant_id(&variant_id)?;

    let movements = services.stock.movements(&ctx, variant_id).await?;
    Ok(ApiResponse::ok(
        "Stock movements fetched",
        movements.into_iter().map(MovementView::from).collect(),
    ))
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(variant_id): Path<String>,
    body: Result<Json<AdjustStockRequest>, JsonRejection>,
) -> Reply<MovementView> {
    let variant_id = dto::parse_variant_id(&variant_id)?;
    let Json(body) = body?;

    let movement = services
        .stock
        .adjust(&ctx, variant_id, body.quantity, body.note)
        .await?;
    Ok(ApiResponse::created("Stock adjusted", movement.into()))
}
