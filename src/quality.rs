// src/quality.rs
//! Quality filter: shallow-announcement detection, breaking markers and the
//! optional newsworthiness screen.

use serde::Serialize;

use crate::config::QualityConfig;
use crate::normalize::{char_len, extract_details, fold_tr, split_sentences};

/// Why a candidate was not publishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    Spam,
    TooShort,
    NotNewsworthy,
    Shallow,
    ThinDetail,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Spam => "spam",
            Rejection::TooShort => "too_short",
            Rejection::NotNewsworthy => "not_newsworthy",
            Rejection::Shallow => "shallow",
            Rejection::ThinDetail => "thin_detail",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QualityFilter {
    cfg: QualityConfig,
    // Pre-folded keyword tables
    shallow: Vec<String>,
    breaking: Vec<String>,
    spam: Vec<String>,
    newsworthy: Vec<String>,
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}

impl QualityFilter {
    pub fn new(cfg: QualityConfig) -> Self {
        let fold_all = |v: &[String]| v.iter().map(|s| fold_tr(s.trim())).collect::<Vec<_>>();
        Self {
            shallow: fold_all(&cfg.shallow_phrases),
            breaking: fold_all(&cfg.breaking_keywords),
            spam: fold_all(&cfg.screen.spam_words),
            newsworthy: fold_all(&cfg.screen.newsworthy_words),
            cfg,
        }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.cfg
    }

    pub fn extract_details(&self, content: &str) -> Vec<String> {
        extract_details(content, &self.cfg)
    }

    /// An announcement phrase ("belirlendi", "açıklandı", ...) without quantitative backing.
    pub fn is_shallow(&self, content: &str, details: &[String]) -> bool {
        let folded = fold_tr(content);
        let announced = self.shallow.iter().any(|p| folded.contains(p.as_str()));
        if !announced {
            return false;
        }
        let has_numbers = details
            .iter()
            .any(|d| d.chars().any(|c| c.is_ascii_digit()));
        details.len() < self.cfg.min_details || !has_numbers
    }

    /// Urgency keywords in title or content. Only affects selection order.
    pub fn is_breaking(&self, title: &str, content: &str) -> bool {
        let folded = fold_tr(&format!("{title} {content}"));
        self.breaking.iter().any(|k| folded.contains(k.as_str()))
    }

    /// Newsworthiness screen; always passes when disabled in config.
    pub fn screen(&self, title: &str, content: &str) -> Result<(), Rejection> {
        let screen = &self.cfg.screen;
        if !screen.enabled {
            return Ok(());
        }
        let text = format!("{title} {content}");
        let folded = fold_tr(&text);
        if self.spam.iter().any(|w| folded.contains(w.as_str())) {
            return Err(Rejection::Spam);
        }
        if char_len(&text) < screen.min_length {
            return Err(Rejection::TooShort);
        }
        if screen.require_newsworthy && !self.newsworthy.iter().any(|w| folded.contains(w.as_str()))
        {
            return Err(Rejection::NotNewsworthy);
        }
        Ok(())
    }

    /// Full publishability check. Returns the bullet details on success.
    ///
    /// Under-produced extractions get one more chance from raw sentences before rejection.
    pub fn assess(&self, title: &str, content: &str) -> Result<Vec<String>, Rejection> {
        self.screen(title, content)?;

        let mut details = self.extract_details(content);
        if self.is_shallow(content, &details) {
            return Err(Rejection::Shallow);
        }

        if details.len() < self.cfg.min_details {
            let fallback: Vec<&str> = split_sentences(content)
                .filter(|s| char_len(s) > self.cfg.fallback_min_chars)
                .take(self.cfg.fallback_take)
                .collect();
            for s in fallback {
                if !details.iter().any(|d| d == s) {
                    details.push(s.to_string());
                }
            }
            if details.len() < self.cfg.min_details {
                return Err(Rejection::ThinDetail);
            }
        }

        details.truncate(self.cfg.max_details);
        Ok(details)
    }
}
