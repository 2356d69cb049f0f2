//! Optional enrichment for the dashboard path: bullet summary plus a short commentary.
//! Never consulted by the publication scheduler.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::EnrichConfig;
use crate::normalize::{char_len, split_sentences};
use crate::types::CandidateItem;

pub const FALLBACK_COMMENT: &str =
    "Bu haber için AI analizi yapılamadı. API anahtarını kontrol edin.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub summary: Vec<String>,
    pub comment: String,
    pub verified: bool,
    pub category: String,
    pub tags: Vec<String>,
}

#[async_trait]
pub trait Enricher: Send + Sync {
    async fn summarize(&self, item: &CandidateItem) -> Result<Enrichment>;
    fn name(&self) -> &'static str;
}

pub type DynEnricher = Arc<dyn Enricher>;

/// First three sentences of 20..200 chars, else the title.
pub fn extractive_summary(item: &CandidateItem) -> Enrichment {
    let summary: Vec<String> = split_sentences(&item.content)
        .filter(|s| (21..200).contains(&char_len(s)))
        .take(3)
        .map(str::to_string)
        .collect();
    Enrichment {
        summary: if summary.is_empty() {
            vec![item.title.trim().to_string()]
        } else {
            summary
        },
        comment: FALLBACK_COMMENT.to_string(),
        verified: false,
        category: "diger".to_string(),
        tags: Vec::new(),
    }
}

pub struct ExtractiveEnricher;

#[async_trait]
impl Enricher for ExtractiveEnricher {
    async fn summarize(&self, item: &CandidateItem) -> Result<Enrichment> {
        Ok(extractive_summary(item))
    }
    fn name(&self) -> &'static str {
        "extractive"
    }
}

/// OpenAI Chat Completions with a JSON-object response.
pub struct OpenAiEnricher {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiEnricher {
    pub fn new(api_key: String, model: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("emek-relay/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("build openai http client")?;
        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}
#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}
#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}
#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}
#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}
#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
}

/// Shape the model is asked to return. Every field is optional on the way in.
#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct ModelAnswer {
    summary: Vec<String>,
    #[serde(alias = "comment")]
    ai_comment: String,
    verified: Option<bool>,
    category: Option<String>,
    tags: Vec<String>,
}

const SYSTEM_PROMPT: &str =
    "Sen Türkiye emek ve kamu dünyası uzmanı bir haber analistisin. JSON formatında yanıt ver.";

fn user_prompt(item: &CandidateItem) -> String {
    format!(
        "Aşağıdaki haberi analiz et:\n\n\
         BAŞLIK: {}\nİÇERİK: {}\nKAYNAK: {}\n\n\
         Şu alanlarla JSON yanıt ver: summary (3-5 tek cümlelik madde), aiComment (2-3 cümle, \
         tarafsız), verified (bool), category (kamu-iscisi | memur | ozel-sektor | sendika | \
         ekonomi | resmi-gazete | tbmm | yargi), tags (en fazla 3).\n\
         Abartı veya spekülasyon yapma.",
        item.title, item.content, item.source_name
    )
}

/// Parse the model's JSON content into an [`Enrichment`]. An empty summary is an error.
pub fn parse_model_answer(content: &str) -> Result<Enrichment> {
    let a: ModelAnswer =
        serde_json::from_str(content.trim()).context("model answer is not JSON")?;
    let summary: Vec<String> = a
        .summary
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if summary.is_empty() {
        bail!("model answer has no summary");
    }
    Ok(Enrichment {
        summary,
        comment: a.ai_comment.trim().to_string(),
        verified: a.verified.unwrap_or(true),
        category: a.category.unwrap_or_else(|| "diger".to_string()),
        tags: a.tags,
    })
}

#[async_trait]
impl Enricher for OpenAiEnricher {
    async fn summarize(&self, item: &CandidateItem) -> Result<Enrichment> {
        let prompt = user_prompt(item);
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.7,
            max_tokens: 1000,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai request")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("openai returned {status}");
        }
        let body: Resp = resp.json().await.context("openai response body")?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        parse_model_answer(&content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Never fails: provider errors degrade to the extractive summary.
pub async fn summarize_or_fallback(enricher: &dyn Enricher, item: &CandidateItem) -> Enrichment {
    match enricher.summarize(item).await {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(enricher = enricher.name(), error = ?e, "enrichment failed, using fallback");
            extractive_summary(item)
        }
    }
}

/// OpenAI when enabled and a key resolves, extractive otherwise.
pub fn enricher_from_config(cfg: &EnrichConfig) -> DynEnricher {
    let Some(key) = cfg.resolved_api_key() else {
        return Arc::new(ExtractiveEnricher);
    };
    match OpenAiEnricher::new(key, &cfg.model, Duration::from_secs(cfg.timeout_secs)) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::warn!(error = ?e, "openai enricher unavailable");
            Arc::new(ExtractiveEnricher)
        }
    }
}
