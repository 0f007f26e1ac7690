//! Liveness endpoint.

use crate::error::AppResult;
use crate::models::HealthResponse;
use crate::response::ApiResponse;

/// `GET /health`: liveness probe.
pub async fn health_handler() -> AppResult<ApiResponse<HealthResponse>> {
    Ok(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: ident_core::version().to_string(),
    }))
}
