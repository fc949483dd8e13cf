use std::sync::Arc;

use axum::{
    extract::{Extension, Path, rejection::JsonRejection},
    routing::{get, post},
    Json, Router,
};

use stockledger_auth::AuthContext;

use crate::app::dto::{self, RegisterVariantRequest, VariantView};
use crate::app::errors::{ApiError, ApiResponse};
use crate::app::services::AppServices;

type Reply<T> = Result<ApiResponse<T>, ApiError>;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_variant))
        .route("/:variant_id", get(get_variant))
}

pub async fn register_variant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    body: Result<Json<RegisterVariantRequest>, JsonRejection>,
) -> Reply<VariantView> {
    let Json(body) = body?;

    let variant = services.stock.register_variant(&ctx, body.into_domain()).await?;
    Ok(ApiResponse::created("Variant registered", variant.into()))
}

pub async fn get_variant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(variant_id): Path<String>,
) -> Reply<VariantView> {
    let variant_id = dto::parse_variant_id(&variant_id)?;

    let variant = services.stock.variant(&ctx, variant_id).await?;
    Ok(ApiResponse::ok("Variant fetched", variant.into()))
}
