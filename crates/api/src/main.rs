use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use storefront_api::app::{build_app, services::build_services};
use storefront_api::shutdown::{ShutdownCoordinator, termination_signal};
use storefront_infra::config::get_config;
use storefront_infra::jobs::JobTracker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = get_config().context("failed to load configuration")?;
    storefront_observability::init(cfg.log.format);

    let tracker = JobTracker::new();
    let services = Arc::new(build_services(&cfg, tracker.clone()).await?);
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(&cfg.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.http_addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    let coordinator = ShutdownCoordinator::new(
        tracker,
        cfg.shutdown.drain_timeout(),
        cfg.shutdown.release_timeout(),
    );
    let stop_accepting = coordinator.draining();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(stop_accepting)
            .await
    });

    if let Err(e) = coordinator.run(termination_signal(), server).await {
        error!(error = %e, "forcing exit");
        std::process::exit(1);
    }

    info!("stopped");
    Ok(())
}
