//! KPI Aggregation
//!
//! Summary counters shown on the dashboard for one batch of classifications.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use crate::classify::Classification;
use crate::labels::{Sentiment, Urgency};

/// Number of bins of the confidence histogram
pub const CONFIDENCE_BINS: usize = 20;

/// Count of one label
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
    pub percent: f64,
}

/// Messages of one day, split by sentiment
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub total: usize,
    pub positif: usize,
    pub negatif: usize,
    pub neutre: usize,
}

/// Aggregated indicators for a batch
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KpiReport {
    pub total: usize,
    pub claims: usize,
    pub claim_percent: f64,
    pub negatives: usize,
    pub negative_percent: f64,
    pub urgent: usize,
    pub urgent_percent: f64,
    pub confidence_avg: f64,
    pub confidence_min: f64,
    pub confidence_max: f64,
    /// `(positive - negative) / total * 50 + 50`, 50 for an empty batch
    pub satisfaction_index: f64,
    pub sentiment: Vec<LabelCount>,
    pub urgency: Vec<LabelCount>,
    pub topic: Vec<LabelCount>,
    pub incident: Vec<LabelCount>,
    pub category: Vec<LabelCount>,
    pub backends: Vec<LabelCount>,
    /// Counts per confidence bin over [0, 1]
    pub confidence_histogram: Vec<usize>,
    /// Per-day volume, empty when the upload has no usable date column
    pub daily: Vec<DailyCount>,
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

/// Count labels, sorted by count descending then label
fn distribution<T, F>(results: &[Classification], key: F) -> Vec<LabelCount>
where
    T: Eq + Hash + std::fmt::Display,
    F: Fn(&Classification) -> T,
{
    let mut counts: HashMap<T, usize> = HashMap::new();
    for result in results {
        *counts.entry(key(result)).or_default() += 1;
    }

    let mut out: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, count)| LabelCount {
            label: label.to_string(),
            count,
            percent: percent(count, results.len()),
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    out
}

/// Histogram of confidences over [0, 1]; 1.0 falls in the last bin
pub fn confidence_histogram(results: &[Classification], bins: usize) -> Vec<usize> {
    let bins = bins.max(1);
    let mut histogram = vec![0; bins];
    for result in results {
        let value = f64::from(result.confidence).clamp(0.0, 1.0);
        let idx = ((value * bins as f64) as usize).min(bins - 1);
        histogram[idx] += 1;
    }
    histogram
}

/// Satisfaction on a 0-100 scale from the sentiment balance
pub fn satisfaction_index(results: &[Classification]) -> f64 {
    if results.is_empty() {
        return 50.0;
    }
    let positive = results
        .iter()
        .filter(|r| r.sentiment == Sentiment::Positif)
        .count() as f64;
    let negative = results
        .iter()
        .filter(|r| r.sentiment == Sentiment::Negatif)
        .count() as f64;
    (positive - negative) / results.len() as f64 * 50.0 + 50.0
}

/// Count messages per day; `dates` is index-aligned with `results`
pub fn daily_volume(dates: &[Option<NaiveDate>], results: &[Classification]) -> Vec<DailyCount> {
    let mut days: BTreeMap<NaiveDate, DailyCount> = BTreeMap::new();
    for (date, result) in dates.iter().zip(results) {
        let Some(date) = *date else { continue };
        let day = days.entry(date).or_insert_with(|| DailyCount {
            date,
            total: 0,
            positif: 0,
            negatif: 0,
            neutre: 0,
        });
        day.total += 1;
        match result.sentiment {
            Sentiment::Positif => day.positif += 1,
            Sentiment::Negatif => day.negatif += 1,
            Sentiment::Neutre => day.neutre += 1,
        }
    }
    days.into_values().collect()
}

/// Compute the KPI report
pub fn compute(results: &[Classification]) -> KpiReport {
    compute_with_dates(results, &[])
}

/// Compute the KPI report, with the message dates when the upload has them
pub fn compute_with_dates(results: &[Classification], dates: &[Option<NaiveDate>]) -> KpiReport {
    let total = results.len();
    let claims = results.iter().filter(|r| r.is_claim).count();
    let negatives = results
        .iter()
        .filter(|r| r.sentiment == Sentiment::Negatif)
        .count();
    let urgent = results
        .iter()
        .filter(|r| r.urgency == Urgency::Haute)
        .count();

    let confidences: Vec<f64> = results.iter().map(|r| f64::from(r.confidence)).collect();
    let (confidence_avg, confidence_min, confidence_max) = if confidences.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let sum: f64 = confidences.iter().sum();
        let min = confidences.iter().copied().fold(f64::INFINITY, f64::min);
        let max = confidences.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (sum / confidences.len() as f64, min, max)
    };

    KpiReport {
        total,
        claims,
        claim_percent: percent(claims, total),
        negatives,
        negative_percent: percent(negatives, total),
        urgent,
        urgent_percent: percent(urgent, total),
        confidence_avg,
        confidence_min,
        confidence_max,
        satisfaction_index: satisfaction_index(results),
        sentiment: distribution(results, |r| r.sentiment),
        urgency: distribution(results, |r| r.urgency),
        topic: distribution(results, |r| r.topic),
        incident: distribution(results, |r| r.incident),
        category: distribution(results, |r| r.category),
        backends: distribution(results, |r| r.backend),
        confidence_histogram: confidence_histogram(results, CONFIDENCE_BINS),
        daily: daily_volume(dates, results),
    }
}
