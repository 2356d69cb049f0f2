// src/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One fetched piece of content, as handed over by a fetcher. Read-only for the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateItem {
    pub title: String,
    /// Raw body; may still carry HTML.
    pub content: String,
    pub source_name: String,
    pub link: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl CandidateItem {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        source_name: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            source_name: source_name.into(),
            link: link.into(),
            published_at: None,
        }
    }

    pub fn with_published_at(mut self, ts: DateTime<Utc>) -> Self {
        self.published_at = Some(ts);
        self
    }

    /// Items without a title or link can never be fingerprinted meaningfully.
    pub fn is_malformed(&self) -> bool {
        self.title.trim().is_empty() || self.link.trim().is_empty()
    }
}

/// Final text payload for a publisher, plus the fields callers need for bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormattedPost {
    pub text: String,
    pub title: String,
    pub link: String,
    pub source: String,
    pub details: Vec<String>,
    pub is_breaking: bool,
}
