// src/publish/mod.rs
pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::types::FormattedPost;

pub use telegram::TelegramPublisher;

/// Downstream channel. `Ok(())` means the post is out; only then may the engine commit.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn send(&self, post: &FormattedPost) -> Result<()>;
    fn name(&self) -> &'static str;
}

pub type DynPublisher = Arc<dyn Publisher>;

/// Dry run: logs the post instead of sending it.
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn send(&self, post: &FormattedPost) -> Result<()> {
        tracing::info!(
            target: "publish",
            title = %post.title,
            link = %post.link,
            breaking = post.is_breaking,
            chars = post.text.chars().count(),
            "dry-run publish"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Telegram when `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID` are set, dry run otherwise.
pub fn publisher_from_env(html: bool) -> DynPublisher {
    match TelegramPublisher::from_env() {
        Some(t) => {
            let t = if html { t.with_parse_mode("HTML") } else { t };
            Arc::new(t)
        }
        None => {
            tracing::warn!(target: "publish", "telegram credentials missing, using dry-run publisher");
            Arc::new(LogPublisher)
        }
    }
}
