// src/scheduler.rs
//! Publication scheduler: night blackout, daily quota and minimum spacing between posts.
//!
//! The scheduler never runs on a timer. Every consultation first applies [`tick`], a pure
//! function that resets the daily counter when the local calendar date has changed.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{ScheduleConfig, MAX_MIN_INTERVAL_MINUTES};

/// Process-wide publication counters. Mutated only by a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerState {
    pub daily_count: u32,
    pub last_reset_date: Option<NaiveDate>,
    pub last_publish_at: Option<DateTime<Utc>>,
}

/// Lazy date rollover: zero the counter when `today` differs from the last reset date.
pub fn tick(state: SchedulerState, today: NaiveDate) -> SchedulerState {
    match state.last_reset_date {
        Some(d) if d == today => state,
        _ => SchedulerState {
            daily_count: 0,
            last_reset_date: Some(today),
            ..state
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleRules {
    pub daily_limit: u32,
    pub min_interval: Duration,
    pub offset: FixedOffset,
    /// Local `[start, end)` hours; `None` disables the blackout.
    pub blackout: Option<(u32, u32)>,
}

impl Default for ScheduleRules {
    fn default() -> Self {
        Self::from_config(&ScheduleConfig::default())
    }
}

impl ScheduleRules {
    pub fn from_config(cfg: &ScheduleConfig) -> Self {
        let offset =
            FixedOffset::east_opt(cfg.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix());
        let blackout = cfg
            .blackout
            .enabled
            .then_some((cfg.blackout.start_hour % 24, cfg.blackout.end_hour % 24));
        Self {
            daily_limit: cfg.daily_limit,
            min_interval: Duration::minutes(
                cfg.min_interval_minutes.clamp(0, MAX_MIN_INTERVAL_MINUTES),
            ),
            offset,
            blackout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerPhase {
    BlackedOut,
    QuotaExhausted,
    CoolingDown,
    Ready,
}

impl SchedulerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerPhase::BlackedOut => "BLACKED_OUT",
            SchedulerPhase::QuotaExhausted => "QUOTA_EXHAUSTED",
            SchedulerPhase::CoolingDown => "COOLING_DOWN",
            SchedulerPhase::Ready => "READY",
        }
    }
}

/// A scheduler rule refused publication. Expected control flow, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    NightHours {
        start_hour: u32,
        end_hour: u32,
        retry_after: Duration,
    },
    QuotaExhausted {
        daily_count: u32,
        daily_limit: u32,
        retry_after: Duration,
    },
    CoolingDown {
        retry_after: Duration,
    },
}

impl Denial {
    pub fn phase(&self) -> SchedulerPhase {
        match self {
            Denial::NightHours { .. } => SchedulerPhase::BlackedOut,
            Denial::QuotaExhausted { .. } => SchedulerPhase::QuotaExhausted,
            Denial::CoolingDown { .. } => SchedulerPhase::CoolingDown,
        }
    }

    pub fn retry_after(&self) -> Duration {
        match *self {
            Denial::NightHours { retry_after, .. }
            | Denial::QuotaExhausted { retry_after, .. }
            | Denial::CoolingDown { retry_after } => retry_after,
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Denial::NightHours {
                start_hour,
                end_hour,
                ..
            } => write!(
                f,
                "night hours: no publishing between {start_hour:02}:00 and {end_hour:02}:00"
            ),
            Denial::QuotaExhausted {
                daily_count,
                daily_limit,
                ..
            } => write!(f, "daily limit reached ({daily_count}/{daily_limit})"),
            Denial::CoolingDown { retry_after } => {
                // rounded up
                let mins = (retry_after.num_seconds() + 59) / 60;
                write!(f, "cooling down: wait {mins} more minute(s)")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyStatus {
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PublishScheduler {
    rules: ScheduleRules,
    state: SchedulerState,
}

impl PublishScheduler {
    pub fn new(rules: ScheduleRules) -> Self {
        Self {
            rules,
            state: SchedulerState::default(),
        }
    }

    pub fn rules(&self) -> &ScheduleRules {
        &self.rules
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn restore(&mut self, state: SchedulerState) {
        self.state = state;
    }

    fn local(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        now.with_timezone(&self.rules.offset)
    }

    fn roll(&mut self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        let local = self.local(now);
        self.state = tick(self.state, local.date_naive());
        local
    }

    /// Rules in order: blackout, daily quota, minimum interval. First failure wins.
    pub fn can_publish_now(&mut self, now: DateTime<Utc>) -> Result<(), Denial> {
        let local = self.roll(now);

        if let Some((start_hour, end_hour)) = self.rules.blackout {
            if in_window(local.hour(), start_hour, end_hour) {
                return Err(Denial::NightHours {
                    start_hour,
                    end_hour,
                    retry_after: until_local_hour(local, end_hour),
                });
            }
        }

        if self.state.daily_count >= self.rules.daily_limit {
            return Err(Denial::QuotaExhausted {
                daily_count: self.state.daily_count,
                daily_limit: self.rules.daily_limit,
                retry_after: until_local_hour(local, 0),
            });
        }

        if let Some(last) = self.state.last_publish_at {
            let elapsed = now.signed_duration_since(last);
            if elapsed < self.rules.min_interval {
                return Err(Denial::CoolingDown {
                    retry_after: self.rules.min_interval - elapsed,
                });
            }
        }

        Ok(())
    }

    pub fn phase(&mut self, now: DateTime<Utc>) -> SchedulerPhase {
        match self.can_publish_now(now) {
            Ok(()) => SchedulerPhase::Ready,
            Err(d) => d.phase(),
        }
    }

    /// Commit side: forced publishes land here too, so they count toward the quota.
    pub fn record_publish(&mut self, now: DateTime<Utc>) {
        self.roll(now);
        self.state.daily_count = self.state.daily_count.saturating_add(1);
        self.state.last_publish_at = Some(now);
    }

    pub fn daily_status(&mut self, now: DateTime<Utc>) -> DailyStatus {
        self.roll(now);
        DailyStatus {
            count: self.state.daily_count,
            limit: self.rules.daily_limit,
            remaining: self.rules.daily_limit.saturating_sub(self.state.daily_count),
        }
    }
}

fn in_window(hour: u32, start: u32, end: u32) -> bool {
    match start.cmp(&end) {
        std::cmp::Ordering::Equal => false,
        std::cmp::Ordering::Less => start <= hour && hour < end,
        std::cmp::Ordering::Greater => hour >= start || hour < end,
    }
}

/// Time until the next local `hour:00`.
fn until_local_hour(local: DateTime<FixedOffset>, hour: u32) -> Duration {
    let now = local.naive_local();
    let Some(mut target) = local.date_naive().and_hms_opt(hour, 0, 0) else {
        return Duration::zero();
    };
    if target <= now {
        target += Duration::days(1);
    }
    target - now
}
