use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::Publisher;
use crate::types::FormattedPost;

const API_BASE: &str = "https://api.telegram.org";

pub struct TelegramPublisher {
    token: String,
    chat_id: String,
    parse_mode: Option<String>,
    api_base: String,
    client: Client,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramPublisher {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            chat_id: chat_id.into(),
            parse_mode: None,
            api_base: API_BASE.to_string(),
            client: Client::new(),
        }
    }

    /// `None` unless both `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID` are non-empty.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let chat = std::env::var("TELEGRAM_CHAT_ID").ok()?;
        if token.trim().is_empty() || chat.trim().is_empty() {
            return None;
        }
        Some(Self::new(token.trim(), chat.trim()))
    }

    pub fn with_parse_mode(mut self, mode: &str) -> Self {
        self.parse_mode = Some(mode.to_string());
        self
    }

    /// Point at a local stub instead of the real Bot API.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.token
        )
    }
}

#[async_trait]
impl Publisher for TelegramPublisher {
    async fn send(&self, post: &FormattedPost) -> Result<()> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: &post.text,
            parse_mode: self.parse_mode.as_deref(),
            disable_web_page_preview: false,
        };

        // The token is part of the URL; keep it out of error messages.
        let resp = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("telegram sendMessage")?;
        let status = resp.status();
        let api: ApiResponse = resp
            .json()
            .await
            .map_err(|e| e.without_url())
            .with_context(|| format!("telegram response body ({status})"))?;

        if !api.ok {
            bail!(
                "telegram rejected message ({status}): {}",
                api.description.unwrap_or_default()
            );
        }
        tracing::info!(target: "publish", chat = %self.chat_id, link = %post.link, "sent to telegram");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
