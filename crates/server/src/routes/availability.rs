//! Diagnostics and manual reset for the availability cache.

use axum::{
    Router,
    Json,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use services::services::availability::AvailabilityRecord;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::DeploymentImpl;

/// `resource: None` clears every entry.
#[derive(Debug, Default, Serialize, Deserialize, TS)]
pub struct ResetAvailabilityRequest {
    #[serde(default)]
    pub resource: Option<String>,
}

/// GET /api/availability
/// Known availability records
pub async fn list_availability(
    State(deployment): State<DeploymentImpl>,
) -> ResponseJson<ApiResponse<Vec<AvailabilityRecord>>> {
    ResponseJson(ApiResponse::success(deployment.cache().records()))
}

/// POST /api/availability/reset
/// Forget cached availability so the next fetch starts from tier 1 again
pub async fn reset_availability(
    State(deployment): State<DeploymentImpl>,
    Json(request): Json<ResetAvailabilityRequest>,
) -> ResponseJson<ApiResponse<Vec<AvailabilityRecord>>> {
    tracing::info!(
        resource = request.resource.as_deref().unwrap_or("*"),
        "Resetting availability cache"
    );
    deployment.cache().reset(request.resource.as_deref());
    ResponseJson(ApiResponse::success(deployment.cache().records()))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/availability", get(list_availability))
        .route("/availability/reset", post(reset_availability))
}
