//! emek-relay — HTTP entrypoint
//! Boots the Axum server with the publishing service, routes and `/metrics`.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use emek_relay::api::{self, AppState};
use emek_relay::config::PublishConfig;
use emek_relay::logging::init_tracing;
use emek_relay::metrics::Metrics;
use emek_relay::service::PublishService;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = PublishConfig::load_default().context("load publish config")?;
    tracing::info!(
        feeds = cfg.feeds.len(),
        daily_limit = cfg.schedule.daily_limit,
        min_interval_minutes = cfg.schedule.min_interval_minutes,
        persistent = cfg.state_path.is_some(),
        "publish config loaded"
    );

    let service = PublishService::from_config(&cfg).await?;
    let mut router = api::router(AppState::new(service));

    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
    }

    Ok(router.into())
}
