use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use db::DBService;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use server::{
    DeploymentImpl,
    deployment::{Deployment, SourceMode},
    routes,
};
use services::services::availability::AvailabilityCache;
use tower::ServiceExt;

async fn deployment() -> DeploymentImpl {
    let db = DBService::in_memory().await.unwrap();
    for statement in [
        "CREATE TABLE manufacturers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            contact_email TEXT,
            phone TEXT,
            is_active BOOLEAN NOT NULL DEFAULT 1
        )",
        "INSERT INTO manufacturers VALUES
            ('8c1d2e3f-4a5b-4c6d-8e7f-901a2b3c4d5e', 'Aesculap', 'orders@aesculap.example', NULL, 1),
            ('9d2e3f4a-5b6c-4d7e-9f80-a12b3c4d5e6f', 'Medacta', NULL, '+41 91 696 60 60', 0)",
    ] {
        sqlx::query(statement).execute(&db.pool).await.unwrap();
    }
    Deployment::from_parts(
        SourceMode::Offline,
        Arc::new(db),
        Arc::new(AvailabilityCache::in_memory()),
        true,
    )
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_source_mode() {
    let app = routes::router(deployment().await);
    let (status, body) = send(app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["source"], "offline");
}

#[tokio::test]
async fn unknown_screen_is_not_found() {
    let app = routes::router(deployment().await);
    let (status, body) = send(app, get("/api/screens/payroll")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Unknown screen: payroll");
}

#[tokio::test]
async fn screen_starts_loading_and_refresh_settles_it() {
    let deployment = deployment().await;

    let (_, body) = send(
        routes::router(deployment.clone()),
        get("/api/screens/manufacturers"),
    )
    .await;
    assert_eq!(body["data"]["phase"], "loading");

    let (status, body) = send(
        routes::router(deployment.clone()),
        post_json("/api/screens/manufacturers/refresh", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["skipped"], false);
    assert_eq!(body["data"]["state"]["phase"], "success");
    assert_eq!(body["data"]["state"]["rows"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["state"]["rows"][1]["is_active"], false);

    let (_, body) = send(
        routes::router(deployment),
        get("/api/screens/manufacturers?q=medacta"),
    )
    .await;
    let rows = body["data"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Medacta");
}

#[tokio::test]
async fn missing_table_reports_not_configured_and_reset_clears_it() {
    let deployment = deployment().await;

    let (_, body) = send(
        routes::router(deployment.clone()),
        post_json("/api/screens/sales_pipeline/refresh", json!({})),
    )
    .await;
    assert_eq!(body["data"]["state"]["phase"], "error");
    assert_eq!(
        body["data"]["state"]["error_message"],
        "sales_opportunities is not configured yet"
    );

    let (_, body) = send(routes::router(deployment.clone()), get("/api/availability")).await;
    assert_eq!(
        body["data"],
        json!([{ "resource_name": "sales_opportunities", "is_available": false }])
    );

    let (_, body) = send(
        routes::router(deployment.clone()),
        post_json(
            "/api/availability/reset",
            json!({ "resource": "sales_opportunities" }),
        ),
    )
    .await;
    assert_eq!(body["data"], json!([]));
    assert_eq!(deployment.cache().get("sales_opportunities"), None);
}

#[tokio::test]
async fn screen_list_includes_cached_availability() {
    let deployment = deployment().await;
    deployment.cache().set("manufacturers", true);

    let (_, body) = send(routes::router(deployment), get("/api/screens")).await;
    let screens = body["data"].as_array().unwrap();
    assert_eq!(screens.len(), 6);
    let manufacturers = screens
        .iter()
        .find(|screen| screen["kind"] == "manufacturers")
        .unwrap();
    assert_eq!(manufacturers["available"], true);
    assert_eq!(manufacturers["resource"], "manufacturers");
}
