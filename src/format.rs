// src/format.rs
//! Post templates. A template is data: body with `{breaking}`, `{title}`, `{bullets}`,
//! `{source}` and `{link}` placeholders, plus bullet/limit/escaping knobs.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::{TemplateConfig, TemplatePreset};
use crate::normalize::char_len;
use crate::types::{CandidateItem, FormattedPost};

static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(breaking|title|bullets|source|link)\}").expect("placeholder regex")
});
static RE_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("blank lines regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostTemplate {
    pub body: String,
    pub breaking_marker: String,
    pub bullet: String,
    pub max_bullets: usize,
    /// Hard cap on the rendered text (X). Bullets go first, then the title, then the
    /// breaking marker; the link is never cut unless it alone exceeds the cap.
    pub max_chars: Option<usize>,
    pub escape_html: bool,
}

impl Default for PostTemplate {
    fn default() -> Self {
        Self::preset(TemplatePreset::Plain)
    }
}

impl PostTemplate {
    pub fn preset(preset: TemplatePreset) -> Self {
        match preset {
            TemplatePreset::Plain => Self {
                body: "{breaking}🟢 {title}\n\n{bullets}\n\n📌 Kaynak: {source}\n🔗 {link}".into(),
                breaking_marker: "🔴 SON DAKİKA\n".into(),
                bullet: "•".into(),
                max_bullets: 5,
                max_chars: None,
                escape_html: false,
            },
            TemplatePreset::TelegramHtml => Self {
                body: "{breaking}🟢 <b>{title}</b>\n\n{bullets}\n\n📰 Kaynak: {source}\n\
                       🔗 <a href=\"{link}\">Haberin Devamı</a>"
                    .into(),
                breaking_marker: "🔴 <b>SON DAKİKA</b>\n".into(),
                bullet: "•".into(),
                max_bullets: 4,
                max_chars: None,
                escape_html: true,
            },
            TemplatePreset::X => Self {
                body: "{breaking}🔴 {title}\n\n{bullets}\n\n🔗 {link}".into(),
                breaking_marker: "⚡ SON DAKİKA\n".into(),
                bullet: "•".into(),
                max_bullets: 3,
                max_chars: Some(280),
                escape_html: false,
            },
            TemplatePreset::Whatsapp => Self {
                body: "{breaking}*{title}*\n\n{bullets}\n\n📌 {source}\n🔗 {link}".into(),
                breaking_marker: "🔴 *SON DAKİKA*\n".into(),
                bullet: "▫️".into(),
                max_bullets: 5,
                max_chars: None,
                escape_html: false,
            },
        }
    }

    pub fn from_config(cfg: &TemplateConfig) -> Self {
        let mut t = Self::preset(cfg.preset);
        if let Some(body) = &cfg.body {
            t.body = body.clone();
        }
        if let Some(marker) = &cfg.breaking_marker {
            t.breaking_marker = marker.clone();
        }
        if let Some(bullet) = &cfg.bullet {
            t.bullet = bullet.clone();
        }
        if let Some(n) = cfg.max_bullets {
            t.max_bullets = n;
        }
        if cfg.max_chars.is_some() {
            t.max_chars = cfg.max_chars;
        }
        if let Some(esc) = cfg.escape_html {
            t.escape_html = esc;
        }
        t
    }

    pub fn render(
        &self,
        item: &CandidateItem,
        details: &[String],
        is_breaking: bool,
    ) -> FormattedPost {
        let title = item.title.trim();
        let wanted = details.len().min(self.max_bullets);

        let mut used = wanted;
        let mut text = self.fill(title, item, &details[..used], is_breaking);
        if let Some(max) = self.max_chars {
            while char_len(&text) > max && used > 0 {
                used -= 1;
                text = self.fill(title, item, &details[..used], is_breaking);
            }
            let mut short = title.to_string();
            let mut keep = char_len(title);
            while char_len(&text) > max && keep > 0 {
                let budget = char_len(&self.escape(&short))
                    .saturating_sub(char_len(&text) - max);
                loop {
                    keep -= 1;
                    short = shorten(title, keep);
                    if keep == 0 || char_len(&self.escape(&short)) <= budget {
                        break;
                    }
                }
                text = self.fill(&short, item, &[], is_breaking);
            }
            if char_len(&text) > max && is_breaking {
                text = self.fill(&short, item, &[], false);
            }
            // Last resort: only reached when source and link alone exceed the cap.
            if char_len(&text) > max {
                text = text.chars().take(max).collect();
            }
        }

        FormattedPost {
            text,
            title: title.to_string(),
            link: item.link.trim().to_string(),
            source: item.source_name.clone(),
            details: details[..used].to_vec(),
            is_breaking,
        }
    }

    fn escape(&self, s: &str) -> String {
        if self.escape_html {
            html_escape::encode_text(s).into_owned()
        } else {
            s.to_string()
        }
    }

    fn fill(
        &self,
        title: &str,
        item: &CandidateItem,
        details: &[String],
        is_breaking: bool,
    ) -> String {
        let esc = |s: &str| self.escape(s);
        let bullets = details
            .iter()
            .map(|d| format!("{} {}", self.bullet, esc(d)))
            .collect::<Vec<_>>()
            .join("\n");
        let link = item.link.trim();

        let out = RE_PLACEHOLDER.replace_all(&self.body, |caps: &Captures| match &caps[1] {
            "breaking" if is_breaking => self.breaking_marker.clone(),
            "breaking" => String::new(),
            "title" => esc(title),
            "bullets" => bullets.clone(),
            "source" => esc(item.source_name.trim()),
            "link" if self.escape_html => {
                html_escape::encode_double_quoted_attribute(link).into_owned()
            }
            _ => link.to_string(),
        });
        RE_BLANK_LINES.replace_all(&out, "\n\n").trim().to_string()
    }
}

fn shorten(title: &str, keep: usize) -> String {
    if keep == 0 {
        String::new()
    } else {
        truncate_chars(title, keep)
    }
}

/// Cut to at most `max` chars, marking the cut with "...".
pub fn truncate_chars(s: &str, max: usize) -> String {
    if char_len(s) <= max {
        return s.to_string();
    }
    if max <= 3 {
        return s.chars().take(max).collect();
    }
    let mut out: String = s.chars().take(max - 3).collect();
    out.push_str("...");
    out
}
