//! Text Cleaning
//!
//! Normalizes message text before classification and removes empty and
//! duplicate rows.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

use super::Record;
use crate::config::ClassifierConfig;
use crate::labels::strip_accents;

/// Telecom terms kept in the cleaned text even when cleaning removed them
const DOMAIN_KEYWORDS: &[&str] = &[
    "free",
    "freebox",
    "free mobile",
    "freebox delta",
    "freebox pop",
    "fibre",
    "fiber",
    "connexion",
    "connection",
    "reseau",
    "réseau",
    "4g",
    "5g",
    "data",
    "debit",
    "débit",
    "facture",
    "facturation",
    "reclamation",
    "réclamation",
    "incident",
    "panne",
    "bug",
    "sav",
    "support",
    "service client",
    "assistance",
    "wifi",
    "box",
    "modem",
];

/// Statistics of one cleaning pass
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CleaningStats {
    pub total_original: usize,
    pub empty_removed: usize,
    pub duplicates_removed: usize,
    pub total_cleaned: usize,
    pub avg_length_before: f64,
    pub avg_length_after: f64,
}

/// Configurable message cleaner
pub struct TextCleaner {
    remove_urls: bool,
    remove_mentions: bool,
    remove_hashtags: bool,
    lowercase: bool,
    fold_accents: bool,
    preserve_domain_keywords: bool,
    stopwords: HashSet<String>,
    url_re: Regex,
    mention_re: Regex,
    hashtag_re: Regex,
    whitespace_re: Regex,
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl TextCleaner {
    pub fn new() -> Self {
        Self {
            remove_urls: true,
            remove_mentions: true,
            remove_hashtags: false,
            lowercase: true,
            fold_accents: true,
            preserve_domain_keywords: true,
            stopwords: HashSet::new(),
            url_re: Regex::new(r"https?\S+|www\S+").expect("valid url pattern"),
            mention_re: Regex::new(r"@\w+").expect("valid mention pattern"),
            hashtag_re: Regex::new(r"#\w+").expect("valid hashtag pattern"),
            whitespace_re: Regex::new(r"\s+").expect("valid whitespace pattern"),
        }
    }

    /// Cleaner with the steps enabled in the configuration
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new()
            .with_remove_urls(config.remove_urls)
            .with_remove_mentions(config.remove_mentions)
            .with_remove_hashtags(config.remove_hashtags)
            .with_lowercase(config.lowercase)
            .with_fold_accents(config.fold_accents)
            .with_preserve_domain_keywords(config.preserve_domain_keywords)
            .with_stopwords(&config.extra_stopwords)
    }

    pub fn with_remove_urls(mut self, enabled: bool) -> Self {
        self.remove_urls = enabled;
        self
    }

    pub fn with_remove_mentions(mut self, enabled: bool) -> Self {
        self.remove_mentions = enabled;
        self
    }

    pub fn with_remove_hashtags(mut self, enabled: bool) -> Self {
        self.remove_hashtags = enabled;
        self
    }

    pub fn with_lowercase(mut self, enabled: bool) -> Self {
        self.lowercase = enabled;
        self
    }

    pub fn with_fold_accents(mut self, enabled: bool) -> Self {
        self.fold_accents = enabled;
        self
    }

    pub fn with_preserve_domain_keywords(mut self, enabled: bool) -> Self {
        self.preserve_domain_keywords = enabled;
        self
    }

    pub fn with_stopwords<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stopwords = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        self
    }

    /// Clean one message
    pub fn clean(&self, text: &str) -> String {
        let mut cleaned = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        if self.remove_urls {
            cleaned = self.url_re.replace_all(&cleaned, "").into_owned();
        }
        if self.remove_mentions {
            cleaned = self.mention_re.replace_all(&cleaned, "").into_owned();
        }
        if self.remove_hashtags {
            cleaned = self.hashtag_re.replace_all(&cleaned, "").into_owned();
        }
        if self.fold_accents {
            cleaned = strip_accents(&cleaned);
        }

        cleaned = self
            .whitespace_re
            .replace_all(&cleaned, " ")
            .trim()
            .to_string();

        if !self.stopwords.is_empty() {
            cleaned = cleaned
                .split_whitespace()
                .filter(|token| !self.stopwords.contains(*token))
                .collect::<Vec<_>>()
                .join(" ");
        }

        if self.preserve_domain_keywords && !cleaned.is_empty() {
            // Keywords are matched in the same accent form as the output
            let fold = |s: &str| {
                if self.fold_accents {
                    strip_accents(s)
                } else {
                    s.to_string()
                }
            };
            let raw = fold(&text.to_lowercase());
            let mut preserved: Vec<String> = Vec::new();
            for keyword in DOMAIN_KEYWORDS.iter().map(|k| fold(*k)) {
                let token = keyword.replace(' ', "_");
                if raw.contains(&keyword) && !cleaned.contains(&keyword) && !preserved.contains(&token) {
                    preserved.push(token);
                }
            }
            if !preserved.is_empty() {
                cleaned = format!("{} {}", cleaned, preserved.join(" "));
            }
        }

        cleaned
    }
}

fn avg_chars<'a>(texts: impl Iterator<Item = &'a str>) -> f64 {
    let (count, total) = texts.fold((0usize, 0usize), |(n, sum), t| (n + 1, sum + t.chars().count()));
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

/// Drop empty and duplicate rows, then clean the rest
///
/// Duplicates are exact matches on the raw text; the first occurrence is
/// kept. Records whose cleaned text is empty are dropped.
pub fn clean_records(cleaner: &TextCleaner, records: Vec<Record>) -> (Vec<Record>, CleaningStats) {
    let mut stats = CleaningStats {
        total_original: records.len(),
        ..CleaningStats::default()
    };

    let non_empty: Vec<Record> = records
        .into_iter()
        .filter(|r| !r.text.trim().is_empty())
        .collect();
    stats.empty_removed = stats.total_original - non_empty.len();

    let mut seen = HashSet::new();
    let unique: Vec<Record> = non_empty
        .into_iter()
        .filter(|r| seen.insert(r.text.clone()))
        .collect();
    stats.duplicates_removed = stats.total_original - stats.empty_removed - unique.len();

    stats.avg_length_before = avg_chars(unique.iter().map(|r| r.text.as_str()));

    let mut cleaned: Vec<Record> = unique
        .into_iter()
        .map(|mut r| {
            r.cleaned = cleaner.clean(&r.text);
            r
        })
        .collect();

    stats.avg_length_after = avg_chars(cleaned.iter().map(|r| r.cleaned.as_str()));

    cleaned.retain(|r| !r.cleaned.is_empty());
    stats.total_cleaned = cleaned.len();

    tracing::info!(
        original = stats.total_original,
        empty = stats.empty_removed,
        duplicates = stats.duplicates_removed,
        cleaned = stats.total_cleaned,
        "Cleaned upload"
    );

    (cleaned, stats)
}
