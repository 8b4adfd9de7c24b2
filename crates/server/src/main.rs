use anyhow::Context;
use server::{DeploymentImpl, routes};
use services::services::config::Config;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    utils::logging::init("info");

    let config = Config::from_env().context("invalid configuration")?;
    let address = format!("{}:{}", config.host, config.port);
    let poll_interval = config.dashboard_poll_interval;

    let deployment = DeploymentImpl::new(config).await?;

    // Initial load runs in the background; screens report `loading` until it settles.
    let registry = deployment.registry().clone();
    tokio::spawn(async move {
        let outcomes = registry.refresh_all().await;
        info!(screens = outcomes.len(), "Initial screen load finished");
    });
    let poller = deployment.registry().start_dashboard_polling(poll_interval);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    info!(
        "Server running on http://{} ({} data source)",
        listener.local_addr()?,
        deployment.mode()
    );

    axum::serve(listener, routes::router(deployment.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    deployment.registry().unmount_all();
    let _ = poller.await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
