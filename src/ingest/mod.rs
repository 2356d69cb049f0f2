// src/ingest/mod.rs
pub mod rss;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::cmp::Reverse;

use crate::config::FeedConfig;
use crate::ingest::rss::RssFetcher;
use crate::ingest::types::Fetcher;
use crate::types::CandidateItem;

/// Upper bound on the merged candidate list handed to the engine.
pub const MAX_CANDIDATES: usize = 50;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Candidate items parsed from feeds.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Feed fetch/parse errors."
        );
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts when the aggregator last ran."
        );
    });
}

/// Fixed candidate list. Used by tests and as a dry-run source.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    items: Vec<CandidateItem>,
}

impl StaticFetcher {
    pub fn new(items: Vec<CandidateItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch_candidates(&self) -> Result<Vec<CandidateItem>> {
        Ok(self.items.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Merges every provider's items, newest first. A failing provider is logged and skipped.
pub struct FeedAggregator {
    providers: Vec<Box<dyn Fetcher>>,
    limit: usize,
}

impl FeedAggregator {
    pub fn new(providers: Vec<Box<dyn Fetcher>>) -> Self {
        Self {
            providers,
            limit: MAX_CANDIDATES,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn from_feeds(feeds: &[FeedConfig]) -> Self {
        let providers = feeds
            .iter()
            .map(|f| Box::new(RssFetcher::from_url(&f.name, &f.url)) as Box<dyn Fetcher>)
            .collect();
        Self::new(providers)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl Fetcher for FeedAggregator {
    async fn fetch_candidates(&self) -> Result<Vec<CandidateItem>> {
        ensure_metrics_described();

        let mut all = Vec::new();
        for p in &self.providers {
            match p.fetch_candidates().await {
                Ok(mut v) => {
                    tracing::debug!(target: "ingest", provider = p.name(), items = v.len(), "fetched");
                    all.append(&mut v);
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", error = ?e, provider = p.name(), "provider error");
                    counter!("ingest_provider_errors_total").increment(1);
                }
            }
        }

        // Stable sort: undated items keep feed order, after the dated ones.
        all.sort_by_key(|it| Reverse(it.published_at));
        all.truncate(self.limit);

        gauge!("ingest_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        Ok(all)
    }

    fn name(&self) -> &str {
        "aggregator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    struct Failing;

    #[async_trait]
    impl Fetcher for Failing {
        async fn fetch_candidates(&self) -> Result<Vec<CandidateItem>> {
            anyhow::bail!("boom")
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    fn dated(title: &str, day: u32) -> CandidateItem {
        CandidateItem::new(title, "", "Test", format!("https://x/{title}"))
            .with_published_at(Utc.with_ymd_and_hms(2025, 1, day, 8, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn merges_newest_first_and_skips_failures() {
        let agg = FeedAggregator::new(vec![
            Box::new(StaticFetcher::new(vec![dated("a", 1), dated("c", 3)])),
            Box::new(Failing),
            Box::new(StaticFetcher::new(vec![
                CandidateItem::new("undated", "", "Test", "https://x/u"),
                dated("b", 2),
            ])),
        ]);
        let items = agg.fetch_candidates().await.unwrap();
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["c", "b", "a", "undated"]);
    }

    #[tokio::test]
    async fn truncates_to_limit() {
        let many = (1..=20).map(|d| dated(&format!("t{d}"), d)).collect();
        let agg = FeedAggregator::new(vec![Box::new(StaticFetcher::new(many))]).with_limit(5);
        let items = agg.fetch_candidates().await.unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].title, "t20");
    }
}
