// src/normalize.rs
//! Content normalizer: HTML cleanup for fetched bodies and detail-sentence extraction.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::QualityConfig;

static RE_SCRIPT_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>").expect("script/style regex")
});
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
// Short, digit-free label at the very start ("Kamu-Sen: ...", "Ankara - ...").
static RE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^:\u{2013}\d]{1,40}?\s*(?::|\u{2013}|\s-\s)\s*").expect("label regex")
});

/// Clean a fetched body: drop script/style, strip tags, decode entities,
/// fold typographic quotes and collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let out = RE_SCRIPT_STYLE.replace_all(s, " ");
    let out = RE_TAGS.replace_all(&out, " ");
    let out = html_escape::decode_html_entities(&out)
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    RE_WS.replace_all(&out, " ").trim().to_string()
}

/// Turkish-aware case folding (`I` -> `ı`, `İ` -> `i`).
pub fn fold_tr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            'I' => out.push('ı'),
            'İ' => out.push('i'),
            c => out.extend(c.to_lowercase()),
        }
    }
    out
}

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Sentence-like fragments, split on `.`, `!` and `?`, trimmed.
pub fn split_sentences(content: &str) -> impl Iterator<Item = &str> {
    content.split(['.', '!', '?']).map(str::trim)
}

/// `needle` occurs in `haystack` at the start of a word.
pub(crate) fn contains_word_start(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(i, _)| {
        haystack[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphabetic())
    })
}

fn is_information_bearing(sentence: &str, cfg: &QualityConfig) -> bool {
    if sentence.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }
    if cfg.info_markers.iter().any(|m| sentence.contains(m.as_str())) {
        return true;
    }
    let folded = fold_tr(sentence);
    cfg.info_words.iter().any(|w| folded.contains(w.as_str()))
        || cfg
            .month_names
            .iter()
            .any(|m| contains_word_start(&folded, m))
}

fn strip_label_prefix(sentence: &str) -> &str {
    match RE_LABEL.find(sentence) {
        Some(m) => &sentence[m.end()..],
        None => sentence,
    }
}

/// Pull up to `max_details` salient sentences out of `content`, in discovery order.
///
/// Information-bearing sentences (digits, currency, percent, month names) come first;
/// when fewer than `min_details` are found, generic sentences of reasonable length
/// top the list up to `target_details`. An empty result means "insufficient detail".
pub fn extract_details(content: &str, cfg: &QualityConfig) -> Vec<String> {
    let sentences: Vec<&str> = split_sentences(content)
        .filter(|s| char_len(s) >= cfg.min_fragment_chars)
        .collect();

    let mut details: Vec<String> = Vec::new();
    for s in &sentences {
        if !is_information_bearing(s, cfg) {
            continue;
        }
        let clean = strip_label_prefix(s).trim();
        let n = char_len(clean);
        if n > cfg.detail_min_chars && n < cfg.detail_max_chars {
            details.push(clean.to_string());
        }
    }

    if details.len() < cfg.min_details {
        for s in &sentences {
            if details.len() >= cfg.target_details {
                break;
            }
            let n = char_len(s);
            if n > cfg.generic_min_chars
                && n < cfg.detail_max_chars
                && !details.iter().any(|d| d == s)
            {
                details.push(s.to_string());
            }
        }
    }

    details.truncate(cfg.max_details);
    details
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> QualityConfig {
        QualityConfig::default()
    }

    #[test]
    fn normalize_strips_html_and_unescapes() {
        let s = "<p>Memur&nbsp;<b>maaşı</b> &ldquo;arttı&rdquo;</p><script>alert(1)</script>";
        assert_eq!(normalize_text(s), r#"Memur maaşı "arttı""#);
    }

    #[test]
    fn normalize_folds_whitespace() {
        assert_eq!(normalize_text("A\u{00A0}\n\tB   C "), "A B C");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn fold_handles_dotted_and_dotless_i() {
        assert_eq!(fold_tr("İŞÇİ AÇIKLANDI"), "işçi açıklandı");
    }

    #[test]
    fn numeric_sentences_are_kept_and_labels_trimmed() {
        let content = "Kamu-Sen: memur maaşlarına yüzde 11 zam yapılacak. \
                       Düzenleme 2025 Ocak ayından itibaren geçerli olacak. Görüşmeler tamamlandı.";
        let d = extract_details(content, &cfg());
        assert_eq!(
            d,
            vec![
                "memur maaşlarına yüzde 11 zam yapılacak".to_string(),
                "Düzenleme 2025 Ocak ayından itibaren geçerli olacak".to_string(),
            ]
        );
    }

    #[test]
    fn ranges_with_hyphen_are_not_treated_as_labels() {
        let content = "2025-2026 döneminde ikramiye ödemeleri iki taksitte yapılacak.";
        let d = extract_details(content, &cfg());
        assert_eq!(d[0], "2025-2026 döneminde ikramiye ödemeleri iki taksitte yapılacak");
    }

    #[test]
    fn month_names_only_match_at_word_start() {
        let c = cfg();
        assert!(is_information_bearing("Zam ödemesi temmuz ayında başlayacak", &c));
        assert!(!is_information_bearing("Aile hekimleri yeni düzenleme istiyor", &c));
    }

    #[test]
    fn generic_sentences_top_up_thin_extractions() {
        let content = "Sendika genel kurulu bugün Ankara'da toplandı. \
                       Genel başkan üyelere uzun bir konuşma yaptı. \
                       Toplantı akşam saatlerine kadar devam etti.";
        let d = extract_details(content, &cfg());
        assert_eq!(d.len(), 3);
        assert!(d.iter().all(|s| !s.chars().any(|c| c.is_ascii_digit())));
    }

    #[test]
    fn nothing_usable_returns_empty() {
        let d = extract_details("Maaşlar belirlendi. Detaylar yakında paylaşılacak.", &cfg());
        assert!(d.is_empty());
    }

    #[test]
    fn result_is_capped_at_five() {
        let content = (1..=8)
            .map(|i| format!("Madde {i} kapsamında ödeme tutarı {i}00 TL olarak uygulanacak"))
            .collect::<Vec<_>>()
            .join(". ");
        let d = extract_details(&content, &cfg());
        assert_eq!(d.len(), 5);
        assert!(d[0].contains("100 TL"));
    }
}
