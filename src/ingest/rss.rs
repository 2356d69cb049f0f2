// src/ingest/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::types::Fetcher;
use crate::normalize::normalize_text;
use crate::types::CandidateItem;

/// Items taken from a single feed per fetch.
pub const MAX_ITEMS_PER_FEED: usize = 15;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "content:encoded", alias = "encoded")]
    content_encoded: Option<String>,
}

/// RFC 2822 (RSS) first, then RFC 3339 (Atom-style dates some feeds emit).
pub fn parse_pub_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    let odt = OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()?;
    DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), odt.nanosecond())
}

pub struct RssFetcher {
    source: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssFetcher {
    pub fn from_fixture_str(source: &str, xml: &str) -> Self {
        Self {
            source: source.to_string(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(source: &str, url: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("emek-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            source: source.to_string(),
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
        }
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<CandidateItem>> {
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing rss xml from {}", self.source))?;

        let mut out = Vec::with_capacity(MAX_ITEMS_PER_FEED);
        for it in rss.channel.item.into_iter().take(MAX_ITEMS_PER_FEED) {
            let (Some(title), Some(link)) = (it.title, it.link) else {
                continue;
            };
            let title = normalize_text(&title);
            let link = link.trim().to_string();
            if title.is_empty() || link.is_empty() {
                continue;
            }
            // Full body when the feed carries one, teaser otherwise.
            let content = it
                .content_encoded
                .as_deref()
                .map(normalize_text)
                .filter(|c| !c.is_empty())
                .or_else(|| it.description.as_deref().map(normalize_text))
                .unwrap_or_default();

            let mut item = CandidateItem::new(title, content, self.source.clone(), link);
            item.published_at = it.pub_date.as_deref().and_then(parse_pub_date);
            out.push(item);
        }

        counter!("ingest_items_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl Fetcher for RssFetcher {
    async fn fetch_candidates(&self) -> Result<Vec<CandidateItem>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("{} http get()", self.source))?
                    .text()
                    .await
                    .with_context(|| format!("{} http .text()", self.source))?;
                self.parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.source
    }
}

/// quick-xml only knows the five XML entities; HTML ones would abort the parse.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_both_date_styles() {
        let a = parse_pub_date("Mon, 10 Mar 2025 09:30:00 +0300").unwrap();
        assert_eq!(a, Utc.with_ymd_and_hms(2025, 3, 10, 6, 30, 0).unwrap());
        let b = parse_pub_date("2025-03-10T06:30:00Z").unwrap();
        assert_eq!(a, b);
        assert!(parse_pub_date("dün akşam").is_none());
    }

    #[tokio::test]
    async fn items_without_link_are_dropped() {
        let xml = r#"<rss><channel>
            <item><title>Bağlantısız</title></item>
            <item><title>Var</title><link>https://x/1</link></item>
        </channel></rss>"#;
        let items = RssFetcher::from_fixture_str("T", xml)
            .fetch_candidates()
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Var");
        assert_eq!(items[0].source_name, "T");
    }
}
