use crate::app::errors::ApiResponse;

pub async fn health() -> ApiResponse<&'static str> {
    ApiResponse::ok("service is healthy", "ok")
}
