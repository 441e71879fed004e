//! Well-known upload columns
//!
//! Besides the message text, uploads often carry a timestamp and, when the
//! file was classified before, label columns. Dates feed the daily volume
//! chart. Label columns replace the classifier's answer for the fields they
//! fill, after normalization.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::classify::Classification;
use crate::labels::{fold, normalize_claim, Category, Incident, Sentiment, Topic, Urgency};

/// Header names tried, in order, for the message date
const DATE_COLUMNS: &[&str] = &["date", "created_at", "timestamp", "datetime"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    // Twitter API
    "%a %b %d %H:%M:%S %z %Y",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

const SENTIMENT_COLUMNS: &[&str] = &["sentiment"];
const CLAIM_COLUMNS: &[&str] = &["is_claim", "reclamation", "is_reclamation", "claim"];
const URGENCY_COLUMNS: &[&str] = &["urgence", "urgency"];
const TOPIC_COLUMNS: &[&str] = &["topic", "theme"];
const INCIDENT_COLUMNS: &[&str] = &["incident"];
const CATEGORY_COLUMNS: &[&str] = &["category", "categorie"];

/// First header matching one of `names`, compared after folding
fn find_header<'a>(headers: impl IntoIterator<Item = &'a str>, names: &[&str]) -> Option<&'a str> {
    let headers: Vec<&str> = headers.into_iter().collect();
    names.iter().find_map(|name| {
        headers
            .iter()
            .find(|h| fold(h) == *name)
            .copied()
    })
}

/// Header of the date column, if the upload has one
pub fn detect_date_column(headers: &[String], text_column: &str) -> Option<String> {
    find_header(
        headers.iter().map(String::as_str).filter(|h| *h != text_column),
        DATE_COLUMNS,
    )
    .map(str::to_string)
}

/// Parse the day of a timestamp in the formats customer exports use
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(value, f).ok())
    {
        return Some(dt.date_naive());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
    {
        return Some(dt.date());
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(value, f).ok())
}

/// Value of a metadata column by exact header
pub fn metadata_value<'a>(metadata: &'a [(String, String)], column: &str) -> Option<&'a str> {
    metadata
        .iter()
        .find(|(name, _)| name == column)
        .map(|(_, value)| value.as_str())
}

/// Labels carried by an uploaded row
///
/// A field is `Some` when its column exists and is not blank. Values outside
/// the alias tables become the field default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    pub sentiment: Option<Sentiment>,
    pub is_claim: Option<bool>,
    pub urgency: Option<Urgency>,
    pub topic: Option<Topic>,
    pub incident: Option<Incident>,
    pub category: Option<Category>,
}

impl Annotations {
    pub fn from_metadata(metadata: &[(String, String)]) -> Self {
        let value = |names: &[&str]| {
            find_header(metadata.iter().map(|(k, _)| k.as_str()), names)
                .and_then(|header| metadata_value(metadata, header))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        Self {
            sentiment: value(SENTIMENT_COLUMNS)
                .map(|v| Sentiment::normalize(v).unwrap_or_default()),
            is_claim: value(CLAIM_COLUMNS).map(|v| normalize_claim(v).unwrap_or(false)),
            urgency: value(URGENCY_COLUMNS).map(|v| Urgency::normalize(v).unwrap_or_default()),
            topic: value(TOPIC_COLUMNS).map(|v| Topic::normalize(v).unwrap_or_default()),
            incident: value(INCIDENT_COLUMNS)
                .map(|v| Incident::normalize(v).unwrap_or_default()),
            category: value(CATEGORY_COLUMNS)
                .map(|v| Category::normalize(v).unwrap_or_default()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite the fields this row carries
    pub fn apply(&self, c: &mut Classification) {
        if let Some(sentiment) = self.sentiment {
            c.sentiment = sentiment;
        }
        if let Some(is_claim) = self.is_claim {
            c.is_claim = is_claim;
        }
        if let Some(urgency) = self.urgency {
            c.urgency = urgency;
        }
        if let Some(topic) = self.topic {
            c.topic = topic;
        }
        if let Some(incident) = self.incident {
            c.incident = incident;
        }
        if let Some(category) = self.category {
            c.category = category;
        }
    }
}
