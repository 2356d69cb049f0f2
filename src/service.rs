//! Publishing service: wires fetcher, engine, publisher and optional state store.
//!
//! The engine sits behind one async mutex. Fetching happens outside it; the
//! plan → send → commit sequence runs while holding it, so two overlapping triggers
//! can never both pass the duplicate/quota checks for the same post.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::PublishConfig;
use crate::engine::{
    EngineStatus, ItemPlan, Nothing, Plan, Published, Refused, SelectOptions, Selection,
    SelectionEngine,
};
use crate::enrich::{
    enricher_from_config, summarize_or_fallback, DynEnricher, Enrichment, ExtractiveEnricher,
};
use crate::format::PostTemplate;
use crate::ingest::types::Fetcher;
use crate::ingest::FeedAggregator;
use crate::publish::{publisher_from_env, DynPublisher};
use crate::scheduler::Denial;
use crate::state::StateStore;
use crate::types::CandidateItem;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published(Published),
    Nothing(Nothing),
    Denied(Denial),
    /// Only produced by [`PublishService::publish_item`].
    Refused(Refused),
}

pub struct PublishService {
    engine: Mutex<SelectionEngine>,
    fetcher: Arc<dyn Fetcher>,
    publisher: DynPublisher,
    enricher: DynEnricher,
    store: Option<StateStore>,
    clock: Clock,
}

impl PublishService {
    pub fn new(
        engine: SelectionEngine,
        fetcher: Arc<dyn Fetcher>,
        publisher: DynPublisher,
    ) -> Self {
        Self {
            engine: Mutex::new(engine),
            fetcher,
            publisher,
            enricher: Arc::new(ExtractiveEnricher),
            store: None,
            clock: system_clock(),
        }
    }

    pub fn with_enricher(mut self, enricher: DynEnricher) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Production wiring: RSS feeds from config, Telegram from env, state file if configured.
    pub async fn from_config(cfg: &PublishConfig) -> Result<Self> {
        let mut engine = SelectionEngine::from_config(cfg);

        let store = cfg.state_path.as_ref().map(StateStore::new);
        if let Some(store) = &store {
            match store.load().await {
                Ok(Some(snap)) => {
                    tracing::info!(
                        path = %store.path().display(),
                        fingerprints = snap.fingerprints.len(),
                        daily_count = snap.scheduler.daily_count,
                        "restored engine state"
                    );
                    engine.restore(snap);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = ?e, "state unreadable, starting fresh"),
            }
        }

        if cfg.feeds.is_empty() {
            tracing::warn!(target: "ingest", "no feeds configured");
        }
        let html = PostTemplate::from_config(&cfg.template).escape_html;
        let mut svc = Self::new(
            engine,
            Arc::new(FeedAggregator::from_feeds(&cfg.feeds)),
            publisher_from_env(html),
        )
        .with_enricher(enricher_from_config(&cfg.enrich));
        svc.store = store;
        Ok(svc)
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Cheap scheduler pre-check so denied cycles skip the network fetch.
    async fn precheck(&self, opts: SelectOptions) -> Result<(), Denial> {
        let now = self.now();
        self.engine.lock().await.gate(now, opts)
    }

    async fn fetch(&self) -> Vec<CandidateItem> {
        match self.fetcher.fetch_candidates().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "ingest", fetcher = self.fetcher.name(), error = ?e, "fetch failed");
                Vec::new()
            }
        }
    }

    /// Select and commit immediately; the caller posts the returned text.
    pub async fn next_post(&self, opts: SelectOptions) -> PublishOutcome {
        if let Err(d) = self.precheck(opts).await {
            return PublishOutcome::Denied(d);
        }
        let candidates = self.fetch().await;

        let mut engine = self.engine.lock().await;
        let now = self.now();
        match engine.plan(&candidates, opts, now) {
            Err(d) => PublishOutcome::Denied(d),
            Ok(Plan::Nothing(n)) => PublishOutcome::Nothing(n),
            Ok(Plan::Selected(sel)) => {
                let published = engine.commit(&sel, now);
                self.persist(&engine).await;
                PublishOutcome::Published(published)
            }
        }
    }

    /// Select, send through the publisher, commit only after a successful send.
    pub async fn autopublish(&self, opts: SelectOptions) -> Result<PublishOutcome> {
        if let Err(d) = self.precheck(opts).await {
            return Ok(PublishOutcome::Denied(d));
        }
        let candidates = self.fetch().await;

        let mut engine = self.engine.lock().await;
        let sel = match engine.plan(&candidates, opts, self.now()) {
            Err(d) => return Ok(PublishOutcome::Denied(d)),
            Ok(Plan::Nothing(n)) => return Ok(PublishOutcome::Nothing(n)),
            Ok(Plan::Selected(sel)) => sel,
        };

        self.send_and_commit(&mut engine, &sel).await
    }

    /// Publish one caller-supplied item through the same filter, lock and commit path.
    pub async fn publish_item(
        &self,
        item: &CandidateItem,
        opts: SelectOptions,
    ) -> Result<PublishOutcome> {
        let mut engine = self.engine.lock().await;
        let sel = match engine.plan_item(item, opts, self.now()) {
            Err(d) => return Ok(PublishOutcome::Denied(d)),
            Ok(ItemPlan::Refused(r)) => return Ok(PublishOutcome::Refused(r)),
            Ok(ItemPlan::Selected(sel)) => sel,
        };
        self.send_and_commit(&mut engine, &sel).await
    }

    async fn send_and_commit(
        &self,
        engine: &mut SelectionEngine,
        sel: &Selection,
    ) -> Result<PublishOutcome> {
        if let Err(e) = self.publisher.send(&sel.post).await {
            counter!("publish_send_failures_total").increment(1);
            tracing::warn!(
                target: "publish",
                publisher = self.publisher.name(),
                fingerprint = %sel.fingerprint,
                error = ?e,
                "send failed, nothing committed"
            );
            return Err(e).with_context(|| format!("{} send", self.publisher.name()));
        }

        let published = engine.commit(sel, self.now());
        self.persist(engine).await;
        Ok(PublishOutcome::Published(published))
    }

    pub async fn status(&self) -> EngineStatus {
        let now = self.now();
        self.engine.lock().await.status(now)
    }

    pub async fn enrich(&self, item: &CandidateItem) -> Enrichment {
        summarize_or_fallback(self.enricher.as_ref(), item).await
    }

    async fn persist(&self, engine: &SelectionEngine) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(&engine.snapshot()).await {
            tracing::warn!(path = %store.path().display(), error = ?e, "state save failed");
        }
    }
}
