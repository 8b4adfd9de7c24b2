//! Routes exposing per-screen state to the presentation layer.

use std::{str::FromStr, sync::Arc};

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use services::services::{
    screen::RefreshOutcome,
    screens::{ScreenHandle, ScreenKind},
};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ScreenSummary {
    pub kind: ScreenKind,
    pub label: String,
    pub resource: String,
    /// `None` until the resource has been fetched or probed.
    pub available: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ScreenQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScreenRefreshResponse {
    /// True when a fetch for the screen was already running.
    pub skipped: bool,
    pub state: Value,
}

fn resolve(deployment: &DeploymentImpl, screen: &str) -> Result<Arc<dyn ScreenHandle>, ApiError> {
    ScreenKind::from_str(screen)
        .ok()
        .and_then(|kind| deployment.registry().get(kind))
        .ok_or_else(|| ApiError::UnknownScreen(screen.to_string()))
}

/// GET /api/screens
/// List every screen with its cached availability
pub async fn list_screens(
    State(deployment): State<DeploymentImpl>,
) -> ResponseJson<ApiResponse<Vec<ScreenSummary>>> {
    let summaries = deployment
        .registry()
        .kinds()
        .into_iter()
        .map(|kind| ScreenSummary {
            kind,
            label: kind.label().to_string(),
            resource: kind.resource().to_string(),
            available: deployment.cache().get(kind.resource()),
        })
        .collect();
    ResponseJson(ApiResponse::success(summaries))
}

/// GET /api/screens/{screen}?q=
/// Current state of a screen, optionally filtered by a search query
pub async fn get_screen(
    State(deployment): State<DeploymentImpl>,
    Path(screen): Path<String>,
    Query(query): Query<ScreenQuery>,
) -> Result<ResponseJson<ApiResponse<Value>>, ApiError> {
    let handle = resolve(&deployment, &screen)?;
    let state = handle.snapshot_json(query.q.as_deref())?;
    Ok(ResponseJson(ApiResponse::success(state)))
}

/// POST /api/screens/{screen}/refresh
/// Re-run the tiered fetch for a screen and return the settled state
pub async fn refresh_screen(
    State(deployment): State<DeploymentImpl>,
    Path(screen): Path<String>,
) -> Result<ResponseJson<ApiResponse<ScreenRefreshResponse>>, ApiError> {
    let handle = resolve(&deployment, &screen)?;
    let outcome = handle.reload().await;
    if outcome == RefreshOutcome::Skipped {
        tracing::debug!(screen = %handle.kind(), "Refresh already in flight");
    }
    Ok(ResponseJson(ApiResponse::success(ScreenRefreshResponse {
        skipped: outcome == RefreshOutcome::Skipped,
        state: handle.snapshot_json(None)?,
    })))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/screens", get(list_screens))
        .route("/screens/{screen}", get(get_screen))
        .route("/screens/{screen}/refresh", post(refresh_screen))
}
