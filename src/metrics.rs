use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if another recorder is already set.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_counter!(
            "select_skipped_total",
            "Candidates skipped during selection, by reason."
        );
        describe_counter!("publish_committed_total", "Posts committed to the ledger.");
        describe_counter!(
            "publish_denied_total",
            "Selection attempts refused by the scheduler, by phase."
        );
        describe_counter!(
            "publish_send_failures_total",
            "Publisher errors; nothing was committed."
        );
        describe_gauge!("publish_daily_count", "Posts committed today (local date).");

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
