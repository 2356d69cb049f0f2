//! # Selection Engine
//! Picks the first publishable, not-yet-published candidate and commits it to the ledger
//! and scheduler. Pure with respect to I/O: time is passed in, collaborators live elsewhere.
//!
//! Selection is split into [`SelectionEngine::plan`] and [`SelectionEngine::commit`] so that a
//! caller sending to an external channel can commit only after the send succeeded.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;

use crate::config::PublishConfig;
use crate::format::PostTemplate;
use crate::ledger::{Fingerprint, PublicationLedger};
use crate::normalize::normalize_text;
use crate::quality::{QualityFilter, Rejection};
use crate::scheduler::{DailyStatus, Denial, PublishScheduler, ScheduleRules, SchedulerPhase};
use crate::state::EngineSnapshot;
use crate::types::{CandidateItem, FormattedPost};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectOptions {
    /// Skip blackout, quota and interval checks. The commit still counts.
    pub force: bool,
    /// Scan for a breaking candidate before falling back to input order.
    pub prefer_breaking: bool,
}

/// A chosen candidate, formatted but not yet committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Cleaned copy of the candidate (HTML stripped, whitespace collapsed).
    pub item: CandidateItem,
    pub fingerprint: Fingerprint,
    pub post: FormattedPost,
}

/// Why a cycle produced nothing. A normal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Nothing {
    NoCandidates,
    AllFiltered {
        malformed: usize,
        duplicates: usize,
        rejected: usize,
    },
}

impl Nothing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Nothing::NoCandidates => "no_candidates",
            Nothing::AllFiltered { .. } => "all_filtered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Selected(Selection),
    Nothing(Nothing),
}

/// Why a single supplied item was turned away before any send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refused {
    Malformed,
    Duplicate(Fingerprint),
    Rejected(Rejection),
}

impl Refused {
    pub fn as_str(&self) -> &'static str {
        match self {
            Refused::Malformed => "malformed",
            Refused::Duplicate(_) => "duplicate",
            Refused::Rejected(r) => r.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemPlan {
    Selected(Selection),
    Refused(Refused),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Published {
    pub post: FormattedPost,
    pub fingerprint: Fingerprint,
    pub daily: DailyStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub daily_count: u32,
    pub daily_limit: u32,
    pub remaining: u32,
    pub phase: SchedulerPhase,
    pub published_count: usize,
}

/// Owns the ledger and scheduler state. One instance per process (or per test).
#[derive(Debug, Clone, Default)]
pub struct SelectionEngine {
    filter: QualityFilter,
    template: PostTemplate,
    ledger: PublicationLedger,
    scheduler: PublishScheduler,
}

impl SelectionEngine {
    pub fn new(
        filter: QualityFilter,
        template: PostTemplate,
        ledger: PublicationLedger,
        scheduler: PublishScheduler,
    ) -> Self {
        Self {
            filter,
            template,
            ledger,
            scheduler,
        }
    }

    pub fn from_config(cfg: &PublishConfig) -> Self {
        Self::new(
            QualityFilter::new(cfg.quality.clone()),
            PostTemplate::from_config(&cfg.template),
            PublicationLedger::from_config(&cfg.ledger),
            PublishScheduler::new(ScheduleRules::from_config(&cfg.schedule)),
        )
    }

    pub fn ledger(&self) -> &PublicationLedger {
        &self.ledger
    }

    pub fn scheduler(&self) -> &PublishScheduler {
        &self.scheduler
    }

    pub fn filter(&self) -> &QualityFilter {
        &self.filter
    }

    /// Scheduler consultation only. Forced calls always pass.
    pub fn gate(&mut self, now: DateTime<Utc>, opts: SelectOptions) -> Result<(), Denial> {
        if opts.force {
            return Ok(());
        }
        self.scheduler.can_publish_now(now).inspect_err(|d| {
            counter!("publish_denied_total", "phase" => d.phase().as_str()).increment(1);
            tracing::debug!(target: "scheduler", phase = d.phase().as_str(), "denied: {d}");
        })
    }

    /// Choose a candidate without committing it. Ledger and counters are left untouched
    /// (apart from the lazy date rollover).
    pub fn plan(
        &mut self,
        candidates: &[CandidateItem],
        opts: SelectOptions,
        now: DateTime<Utc>,
    ) -> Result<Plan, Denial> {
        self.gate(now, opts)?;

        if candidates.is_empty() {
            return Ok(Plan::Nothing(Nothing::NoCandidates));
        }

        let (mut malformed, mut duplicates, mut rejected) = (0usize, 0usize, 0usize);
        let mut fallback: Option<Selection> = None;

        for raw in candidates {
            let item = clean(raw);
            if item.is_malformed() {
                malformed += 1;
                counter!("select_skipped_total", "reason" => "malformed").increment(1);
                continue;
            }

            let fingerprint = self.ledger.fingerprint(raw);
            if self.ledger.contains(&fingerprint) {
                duplicates += 1;
                counter!("select_skipped_total", "reason" => "duplicate").increment(1);
                continue;
            }

            let is_breaking = self.filter.is_breaking(&item.title, &item.content);
            // Once a fallback exists only breaking candidates can still change the outcome.
            if opts.prefer_breaking && !is_breaking && fallback.is_some() {
                continue;
            }

            let details = match self.filter.assess(&item.title, &item.content) {
                Ok(d) => d,
                Err(r) => {
                    rejected += 1;
                    counter!("select_skipped_total", "reason" => r.as_str()).increment(1);
                    tracing::debug!(target: "engine", %fingerprint, reason = r.as_str(), "skipped");
                    continue;
                }
            };

            let post = self.template.render(&item, &details, is_breaking);
            let selection = Selection {
                item,
                fingerprint,
                post,
            };
            if !opts.prefer_breaking || is_breaking {
                return Ok(Plan::Selected(selection));
            }
            fallback.get_or_insert(selection);
        }

        Ok(match fallback {
            Some(s) => Plan::Selected(s),
            None => Plan::Nothing(Nothing::AllFiltered {
                malformed,
                duplicates,
                rejected,
            }),
        })
    }

    /// Plan one caller-supplied item. Duplicates are refused even when forced; the
    /// scheduler is consulted next, then the quality filter. Nothing is committed.
    pub fn plan_item(
        &mut self,
        raw: &CandidateItem,
        opts: SelectOptions,
        now: DateTime<Utc>,
    ) -> Result<ItemPlan, Denial> {
        let item = clean(raw);
        if item.is_malformed() {
            return Ok(ItemPlan::Refused(Refused::Malformed));
        }
        let fingerprint = self.ledger.fingerprint(raw);
        if self.ledger.contains(&fingerprint) {
            counter!("select_skipped_total", "reason" => "duplicate").increment(1);
            return Ok(ItemPlan::Refused(Refused::Duplicate(fingerprint)));
        }

        self.gate(now, opts)?;

        let is_breaking = self.filter.is_breaking(&item.title, &item.content);
        let details = match self.filter.assess(&item.title, &item.content) {
            Ok(d) => d,
            Err(r) => {
                counter!("select_skipped_total", "reason" => r.as_str()).increment(1);
                tracing::debug!(target: "engine", %fingerprint, reason = r.as_str(), "item refused");
                return Ok(ItemPlan::Refused(Refused::Rejected(r)));
            }
        };
        let post = self.template.render(&item, &details, is_breaking);
        Ok(ItemPlan::Selected(Selection {
            item,
            fingerprint,
            post,
        }))
    }

    /// Record a successful publication: ledger insert plus scheduler counters.
    pub fn commit(&mut self, selection: &Selection, now: DateTime<Utc>) -> Published {
        if let Some(evicted) = self.ledger.insert(selection.fingerprint.clone()) {
            tracing::trace!(target: "engine", %evicted, "ledger evicted oldest");
        }
        self.scheduler.record_publish(now);
        let daily = self.scheduler.daily_status(now);

        counter!("publish_committed_total").increment(1);
        gauge!("publish_daily_count").set(daily.count as f64);
        tracing::info!(
            target: "engine",
            fingerprint = %selection.fingerprint,
            source = %selection.post.source,
            breaking = selection.post.is_breaking,
            daily_count = daily.count,
            daily_limit = daily.limit,
            "committed"
        );

        Published {
            post: selection.post.clone(),
            fingerprint: selection.fingerprint.clone(),
            daily,
        }
    }

    /// Plan and commit in one step. `Ok(None)` means nothing qualified this cycle.
    pub fn select_next(
        &mut self,
        candidates: &[CandidateItem],
        opts: SelectOptions,
        now: DateTime<Utc>,
    ) -> Result<Option<Published>, Denial> {
        match self.plan(candidates, opts, now)? {
            Plan::Selected(s) => Ok(Some(self.commit(&s, now))),
            Plan::Nothing(_) => Ok(None),
        }
    }

    pub fn status(&mut self, now: DateTime<Utc>) -> EngineStatus {
        let daily = self.scheduler.daily_status(now);
        EngineStatus {
            daily_count: daily.count,
            daily_limit: daily.limit,
            remaining: daily.remaining,
            phase: self.scheduler.phase(now),
            published_count: self.ledger.len(),
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            fingerprints: self.ledger.fingerprints().cloned().collect(),
            scheduler: self.scheduler.state(),
        }
    }

    pub fn restore(&mut self, snap: EngineSnapshot) {
        self.ledger.restore(snap.fingerprints);
        self.scheduler.restore(snap.scheduler);
    }
}

fn clean(raw: &CandidateItem) -> CandidateItem {
    CandidateItem {
        title: normalize_text(&raw.title),
        content: normalize_text(&raw.content),
        source_name: raw.source_name.trim().to_string(),
        link: raw.link.trim().to_string(),
        published_at: raw.published_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        // 12:00 local at UTC+3
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    fn good(n: u32) -> CandidateItem {
        CandidateItem::new(
            format!("Memur zammı haberi {n}"),
            "Memur maaşlarına yüzde 11 zam yapılacak. \
             Zam 2025 Ocak ayından itibaren geçerli olacak. Görüşmeler tamamlandı.",
            "Memurlar.Net",
            format!("https://x/{n}"),
        )
    }

    #[test]
    fn plan_does_not_commit() {
        let mut e = SelectionEngine::default();
        let plan = e.plan(&[good(1)], SelectOptions::default(), noon()).unwrap();
        assert!(matches!(plan, Plan::Selected(_)));
        assert!(e.ledger().is_empty());
        assert_eq!(e.scheduler().state().daily_count, 0);
    }

    #[test]
    fn html_is_cleaned_before_formatting() {
        let mut e = SelectionEngine::default();
        let mut it = good(1);
        it.title = "<b>Memur</b> &amp; işçi zammı".into();
        let p = e
            .select_next(&[it], SelectOptions::default(), noon())
            .unwrap()
            .unwrap();
        assert_eq!(p.post.title, "Memur & işçi zammı");
    }

    #[test]
    fn supplied_item_is_refused_when_already_published() {
        let mut e = SelectionEngine::default();
        e.select_next(&[good(1)], SelectOptions::default(), noon())
            .unwrap();
        let forced = SelectOptions {
            force: true,
            ..Default::default()
        };
        let plan = e.plan_item(&good(1), forced, noon()).unwrap();
        assert!(matches!(plan, ItemPlan::Refused(Refused::Duplicate(_))));
        // Quota and interval still apply to a fresh item unless forced.
        assert!(e.plan_item(&good(2), SelectOptions::default(), noon()).is_err());
        assert!(matches!(
            e.plan_item(&good(2), forced, noon()).unwrap(),
            ItemPlan::Selected(_)
        ));
    }

    #[test]
    fn supplied_item_goes_through_quality_filter() {
        let mut e = SelectionEngine::default();
        let thin = CandidateItem::new(
            "Maaşlar belirlendi",
            "Maaşlar belirlendi. Detaylar yakında paylaşılacak.",
            "Memurlar.Net",
            "https://x/thin",
        );
        let plan = e.plan_item(&thin, SelectOptions::default(), noon()).unwrap();
        assert!(matches!(plan, ItemPlan::Refused(Refused::Rejected(_))));
        let blank = CandidateItem::new("<b></b>", "", "Memurlar.Net", "https://x/2");
        assert_eq!(
            e.plan_item(&blank, SelectOptions::default(), noon()).unwrap(),
            ItemPlan::Refused(Refused::Malformed)
        );
        assert!(e.ledger().is_empty());
    }

    #[test]
    fn empty_batch_is_no_candidates() {
        let mut e = SelectionEngine::default();
        assert_eq!(
            e.plan(&[], SelectOptions::default(), noon()).unwrap(),
            Plan::Nothing(Nothing::NoCandidates)
        );
    }

    #[test]
    fn filtered_batch_reports_counts() {
        let mut e = SelectionEngine::default();
        e.select_next(&[good(1)], SelectOptions::default(), noon())
            .unwrap();
        let mut bad = good(2);
        bad.link = String::new();
        let plan = e
            .plan(&[good(1), bad], SelectOptions { force: true, ..Default::default() }, noon())
            .unwrap();
        assert_eq!(
            plan,
            Plan::Nothing(Nothing::AllFiltered {
                malformed: 1,
                duplicates: 1,
                rejected: 0
            })
        );
    }

    #[test]
    fn snapshot_roundtrips_into_fresh_engine() {
        let mut e = SelectionEngine::default();
        e.select_next(&[good(1)], SelectOptions::default(), noon())
            .unwrap();
        let mut fresh = SelectionEngine::default();
        fresh.restore(e.snapshot());
        assert!(fresh.ledger().is_duplicate(&good(1)));
        assert_eq!(fresh.scheduler().state().daily_count, 1);
    }
}
