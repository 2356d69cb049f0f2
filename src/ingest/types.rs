// src/ingest/types.rs
use anyhow::Result;

use crate::types::CandidateItem;

/// A source of candidate items (RSS feed, fixture, channel scraper, ...).
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_candidates(&self) -> Result<Vec<CandidateItem>>;
    fn name(&self) -> &str;
}
