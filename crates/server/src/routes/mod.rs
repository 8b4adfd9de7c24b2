use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::DeploymentImpl;

pub mod availability;
pub mod health;
pub mod screens;

pub fn router(deployment: DeploymentImpl) -> Router {
    let base_routes = Router::new()
        .route("/health", get(health::health_check))
        .merge(screens::router(&deployment))
        .merge(availability::router(&deployment));

    Router::new()
        .nest("/api", base_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}
