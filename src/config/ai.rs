// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}

/// Enrichment (LLM summary + commentary) settings, `[enrich]` in publish.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub enabled: bool,
    /// Only "openai" is wired; anything else falls back to extractive summaries.
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".to_string(),
            model: default_model(),
            api_key: "ENV".to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EnrichConfig {
    /// Resolve the API key. Returns `None` when enrichment cannot run.
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.enabled || !self.provider.eq_ignore_ascii_case("openai") {
            return None;
        }
        let key = if self.api_key.trim().eq_ignore_ascii_case("env") {
            env::var("OPENAI_API_KEY").ok()?
        } else {
            self.api_key.clone()
        };
        let key = key.trim().to_string();
        (!key.is_empty()).then_some(key)
    }
}
