pub mod ai;
pub mod publish;

pub use ai::EnrichConfig;
pub use publish::{
    BlackoutConfig, FeedConfig, FingerprintKind, LedgerConfig, PublishConfig, QualityConfig,
    ScheduleConfig, ScreenConfig, TemplateConfig, TemplatePreset, MAX_MIN_INTERVAL_MINUTES,
};
