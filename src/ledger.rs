// src/ledger.rs
//! Deduplication ledger: bounded set of published fingerprints with strict FIFO eviction.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;

use crate::config::{FingerprintKind, LedgerConfig};
use crate::normalize::{fold_tr, normalize_text};
use crate::types::CandidateItem;

/// Opaque equality key derived from title + link. Never decoded back to content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintStrategy {
    /// Hex of the first 16 bytes of SHA-256(normalized title "\n" normalized link).
    Sha256,
    /// First `chars` characters of the lowercased title.
    TitlePrefix { chars: usize },
}

impl FingerprintStrategy {
    pub fn from_config(cfg: &LedgerConfig) -> Self {
        match cfg.fingerprint {
            FingerprintKind::Sha256 => FingerprintStrategy::Sha256,
            FingerprintKind::TitlePrefix => FingerprintStrategy::TitlePrefix {
                chars: cfg.title_prefix_chars,
            },
        }
    }

    pub fn fingerprint(&self, title: &str, link: &str) -> Fingerprint {
        let title = normalize_title(title);
        match *self {
            FingerprintStrategy::Sha256 => {
                use sha2::{Digest, Sha256};
                let mut hasher = Sha256::new();
                hasher.update(title.as_bytes());
                hasher.update(b"\n");
                hasher.update(normalize_link(link).as_bytes());
                let digest = hasher.finalize();
                let mut out = String::with_capacity(32);
                for b in digest.iter().take(16) {
                    use std::fmt::Write as _;
                    let _ = write!(&mut out, "{:02x}", b);
                }
                Fingerprint(out)
            }
            FingerprintStrategy::TitlePrefix { chars } => {
                Fingerprint(title.chars().take(chars).collect())
            }
        }
    }
}

fn normalize_title(title: &str) -> String {
    fold_tr(title)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_link(link: &str) -> String {
    link.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Previously published fingerprints. Lookups never refresh insertion order.
#[derive(Debug, Clone)]
pub struct PublicationLedger {
    strategy: FingerprintStrategy,
    cap: usize,
    order: VecDeque<Fingerprint>,
    seen: HashSet<Fingerprint>,
}

impl Default for PublicationLedger {
    fn default() -> Self {
        Self::from_config(&LedgerConfig::default())
    }
}

impl PublicationLedger {
    /// `cap` of 0 is treated as 1.
    pub fn new(cap: usize, strategy: FingerprintStrategy) -> Self {
        let cap = cap.max(1);
        Self {
            strategy,
            cap,
            order: VecDeque::with_capacity(cap.min(1024)),
            seen: HashSet::with_capacity(cap.min(1024)),
        }
    }

    pub fn from_config(cfg: &LedgerConfig) -> Self {
        Self::new(cfg.capacity, FingerprintStrategy::from_config(cfg))
    }

    /// Key for a raw item. Markup and entities in the title are normalized first, so a
    /// fetched item and its cleaned copy map to the same fingerprint.
    pub fn fingerprint(&self, item: &CandidateItem) -> Fingerprint {
        self.strategy
            .fingerprint(&normalize_text(&item.title), &item.link)
    }

    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.seen.contains(fp)
    }

    /// Malformed items count as duplicates so they are never selected.
    pub fn is_duplicate(&self, item: &CandidateItem) -> bool {
        let title = normalize_text(&item.title);
        if title.is_empty() || item.link.trim().is_empty() {
            return true;
        }
        self.contains(&self.strategy.fingerprint(&title, &item.link))
    }

    pub fn mark_published(&mut self, item: &CandidateItem) -> Fingerprint {
        let fp = self.fingerprint(item);
        self.insert(fp.clone());
        fp
    }

    /// Insert a fingerprint; returns the evicted oldest entry when the cap is exceeded.
    pub fn insert(&mut self, fp: Fingerprint) -> Option<Fingerprint> {
        if !self.seen.insert(fp.clone()) {
            return None;
        }
        self.order.push_back(fp);
        if self.order.len() > self.cap {
            let evicted = self.order.pop_front()?;
            self.seen.remove(&evicted);
            return Some(evicted);
        }
        None
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Oldest first.
    pub fn fingerprints(&self) -> impl Iterator<Item = &Fingerprint> {
        self.order.iter()
    }

    /// Replace contents, keeping only the newest `cap` entries.
    pub fn restore<I: IntoIterator<Item = Fingerprint>>(&mut self, fps: I) {
        self.order.clear();
        self.seen.clear();
        for fp in fps {
            self.insert(fp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, link: &str) -> CandidateItem {
        CandidateItem::new(title, "", "Test", link)
    }

    #[test]
    fn sha_fingerprint_ignores_case_whitespace_and_trailing_slash() {
        let s = FingerprintStrategy::Sha256;
        let a = s.fingerprint("  Memur Zammı  Belli Oldu", "https://X/1/");
        let b = s.fingerprint("memur zammı belli oldu", "https://x/1");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert_ne!(a, s.fingerprint("memur zammı belli oldu", "https://x/2"));
    }

    #[test]
    fn title_prefix_variant_truncates() {
        let s = FingerprintStrategy::TitlePrefix { chars: 10 };
        assert_eq!(s.fingerprint("KAMU İŞÇİSİ ikramiye", "a").as_str(), "kamu işçis");
        assert_eq!(
            s.fingerprint("Kamu işçisi ikramiye", "a"),
            s.fingerprint("Kamu işçisi zam", "b")
        );
    }

    #[test]
    fn fifo_eviction_ignores_access() {
        let mut l = PublicationLedger::new(2, FingerprintStrategy::Sha256);
        let a = item("A haberi", "https://x/a");
        let b = item("B haberi", "https://x/b");
        let c = item("C haberi", "https://x/c");
        l.mark_published(&a);
        l.mark_published(&b);
        // Lookup must not refresh `a`.
        assert!(l.is_duplicate(&a));
        l.mark_published(&c);
        assert_eq!(l.len(), 2);
        assert!(!l.is_duplicate(&a));
        assert!(l.is_duplicate(&b));
        assert!(l.is_duplicate(&c));
    }

    #[test]
    fn reinserting_does_not_grow() {
        let mut l = PublicationLedger::new(3, FingerprintStrategy::Sha256);
        let a = item("A", "https://x/a");
        l.mark_published(&a);
        l.mark_published(&a);
        assert_eq!(l.len(), 1);
    }

    #[test]
    fn malformed_items_are_always_duplicates() {
        let l = PublicationLedger::default();
        assert!(l.is_duplicate(&item("Başlık", "  ")));
        assert!(l.is_duplicate(&item("", "https://x/1")));
    }

    #[test]
    fn markup_in_title_does_not_change_the_key() {
        let mut l = PublicationLedger::default();
        l.mark_published(&item("Memur &amp; <b>işçi</b> zammı", "https://x/1 "));
        assert!(l.is_duplicate(&item("Memur & işçi zammı", "https://x/1")));
        assert!(l.is_duplicate(&item("<p></p>", "https://x/9")));
    }

    #[test]
    fn zero_cap_is_clamped() {
        assert_eq!(PublicationLedger::new(0, FingerprintStrategy::Sha256).capacity(), 1);
    }

    #[test]
    fn restore_keeps_newest() {
        let s = FingerprintStrategy::Sha256;
        let fps: Vec<_> = (0..5).map(|i| s.fingerprint(&format!("t{i}"), "l")).collect();
        let mut l = PublicationLedger::new(3, s);
        l.restore(fps.clone());
        assert_eq!(l.len(), 3);
        assert!(!l.contains(&fps[1]));
        assert!(l.contains(&fps[4]));
        assert_eq!(l.fingerprints().next(), Some(&fps[2]));
    }
}
