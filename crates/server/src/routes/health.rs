use axum::{extract::State, response::Json as ResponseJson};
use serde::Serialize;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::DeploymentImpl;

#[derive(Debug, Serialize, TS)]
pub struct HealthStatus {
    pub status: String,
    /// `hosted` or `offline`.
    pub source: String,
}

/// GET /api/health
pub async fn health_check(
    State(deployment): State<DeploymentImpl>,
) -> ResponseJson<ApiResponse<HealthStatus>> {
    ResponseJson(ApiResponse::success(HealthStatus {
        status: "OK".to_string(),
        source: deployment.mode().to_string(),
    }))
}
