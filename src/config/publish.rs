// src/config/publish.rs
//! Publication policy: schedule, ledger, quality keyword tables, template and feeds.
//!
//! Everything that varied between historical variants of the auto-publish endpoints
//! (keyword lists, thresholds, templates) lives here as data, so policy changes never
//! touch the selection algorithm.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::ai::EnrichConfig;

pub const DEFAULT_PUBLISH_CONFIG_PATH: &str = "config/publish.toml";

pub const ENV_PUBLISH_CONFIG_PATH: &str = "PUBLISH_CONFIG_PATH";
pub const ENV_DAILY_LIMIT: &str = "PUBLISH_DAILY_LIMIT";
pub const ENV_MIN_INTERVAL_MINUTES: &str = "PUBLISH_MIN_INTERVAL_MINUTES";
pub const ENV_LEDGER_CAP: &str = "PUBLISH_LEDGER_CAP";
pub const ENV_STATE_PATH: &str = "PUBLISH_STATE_PATH";

/// Upper bound for `schedule.min_interval_minutes` (one week).
pub const MAX_MIN_INTERVAL_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub schedule: ScheduleConfig,
    pub ledger: LedgerConfig,
    pub quality: QualityConfig,
    pub template: TemplateConfig,
    pub enrich: EnrichConfig,
    pub feeds: Vec<FeedConfig>,
    /// Engine snapshot file. `None` keeps dedup/quota history in memory only.
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub daily_limit: u32,
    pub min_interval_minutes: i64,
    /// Offset used for the blackout hours and the calendar-day rollover (Turkey: +3).
    pub utc_offset_hours: i32,
    pub blackout: BlackoutConfig,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_limit: 8,
            min_interval_minutes: 30,
            utc_offset_hours: 3,
            blackout: BlackoutConfig::default(),
        }
    }
}

/// Local hours `[start_hour, end_hour)` during which nothing is published automatically.
/// `start_hour > end_hour` wraps around midnight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BlackoutConfig {
    pub enabled: bool,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for BlackoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_hour: 1,
            end_hour: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FingerprintKind {
    /// SHA-256 over normalized title + link.
    #[default]
    Sha256,
    /// Lowercased title prefix only.
    TitlePrefix,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub capacity: usize,
    pub fingerprint: FingerprintKind,
    pub title_prefix_chars: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            fingerprint: FingerprintKind::Sha256,
            title_prefix_chars: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Sentence fragments shorter than this are ignored entirely.
    pub min_fragment_chars: usize,
    /// Exclusive length window for information-bearing details (after prefix trimming).
    pub detail_min_chars: usize,
    pub detail_max_chars: usize,
    /// Exclusive lower bound for generic sentences used to top up thin extractions.
    pub generic_min_chars: usize,
    pub min_details: usize,
    pub target_details: usize,
    pub max_details: usize,
    pub fallback_min_chars: usize,
    pub fallback_take: usize,
    /// Matched case-sensitively against the raw sentence.
    pub info_markers: Vec<String>,
    /// Matched against the case-folded sentence.
    pub info_words: Vec<String>,
    pub month_names: Vec<String>,
    pub shallow_phrases: Vec<String>,
    pub breaking_keywords: Vec<String>,
    pub screen: ScreenConfig,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_fragment_chars: 15,
            detail_min_chars: 20,
            detail_max_chars: 150,
            generic_min_chars: 30,
            min_details: 2,
            target_details: 4,
            max_details: 5,
            fallback_min_chars: 30,
            fallback_take: 3,
            info_markers: strings(&["TL", "₺", "$", "€", "%"]),
            info_words: strings(&["yüzde"]),
            month_names: strings(&[
                "ocak", "şubat", "mart", "nisan", "mayıs", "haziran", "temmuz", "ağustos",
                "eylül", "ekim", "kasım", "aralık",
            ]),
            shallow_phrases: strings(&["açıklandı", "belirlendi", "duyuruldu", "belli oldu"]),
            breaking_keywords: strings(&[
                "son dakika",
                "flaş",
                "bugün yürürlüğe girdi",
                "bugünden itibaren yürürlükte",
                "derhal",
                "resmi gazete'de bugün",
                "resmî gazete'de bugün",
                "bugünkü resmi gazete",
            ]),
            screen: ScreenConfig::default(),
        }
    }
}

/// Newsworthiness pre-filter (spam/polemic words, minimum length, topical keywords).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub enabled: bool,
    pub min_length: usize,
    pub require_newsworthy: bool,
    pub spam_words: Vec<String>,
    pub newsworthy_words: Vec<String>,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_length: 50,
            require_newsworthy: true,
            spam_words: strings(&[
                "kulis", "iddia", "söylenti", "dedikodu", "caps", "komik", "espri", "şaka",
                "polemik", "kavga",
            ]),
            newsworthy_words: strings(&[
                "açıklama",
                "duyuru",
                "karar",
                "yönetmelik",
                "zam",
                "maaş",
                "ücret",
                "artış",
                "düzenleme",
                "toplu sözleşme",
                "kıdem tazminatı",
                "asgari ücret",
                "emekli",
                "memur",
                "işçi",
                "sgk",
                "prim",
                "ikramiye",
                "başvuru",
                "son tarih",
                "resmi gazete",
            ]),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TemplatePreset {
    /// Plain text with the bare link; what the cron relay posts as-is.
    #[default]
    Plain,
    TelegramHtml,
    X,
    Whatsapp,
}

/// Template selection: a preset plus optional per-field overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub preset: TemplatePreset,
    pub body: Option<String>,
    pub breaking_marker: Option<String>,
    pub bullet: Option<String>,
    pub max_bullets: Option<usize>,
    pub max_chars: Option<usize>,
    pub escape_html: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

impl PublishConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: PublishConfig = toml::from_str(s).context("parsing publish config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading publish config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $PUBLISH_CONFIG_PATH (must exist)
    /// 2) config/publish.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_PUBLISH_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("PUBLISH_CONFIG_PATH points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_PUBLISH_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from(&default_p)?
            } else {
                tracing::info!(target: "config", "no publish config found, using defaults");
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<u32>(ENV_DAILY_LIMIT) {
            self.schedule.daily_limit = v;
        }
        if let Some(v) = env_parse::<i64>(ENV_MIN_INTERVAL_MINUTES) {
            self.schedule.min_interval_minutes = v;
        }
        if let Some(v) = env_parse::<usize>(ENV_LEDGER_CAP) {
            self.ledger.capacity = v;
        }
        if let Ok(p) = std::env::var(ENV_STATE_PATH) {
            let p = p.trim();
            if !p.is_empty() {
                self.state_path = Some(PathBuf::from(p));
            }
        }
        self.sanitize();
    }

    fn sanitize(&mut self) {
        if self.ledger.capacity == 0 {
            self.ledger.capacity = 1;
        }
        if self.ledger.title_prefix_chars == 0 {
            self.ledger.title_prefix_chars = 40;
        }
        self.schedule.min_interval_minutes = self
            .schedule
            .min_interval_minutes
            .clamp(0, MAX_MIN_INTERVAL_MINUTES);
        self.schedule.utc_offset_hours = self.schedule.utc_offset_hours.clamp(-12, 14);
        let b = &mut self.schedule.blackout;
        b.start_hour %= 24;
        b.end_hour %= 24;
        let q = &mut self.quality;
        if q.max_details == 0 {
            q.max_details = 5;
        }
        q.min_details = q.min_details.min(q.max_details);
        q.target_details = q.target_details.clamp(q.min_details, q.max_details);
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
