//! Message Classification
//!
//! Three interchangeable backends implement the [`Classifier`] trait:
//!
//! - [`RuleClassifier`]: keyword and regex rules, always available
//! - [`LlmClassifier`]: hosted LLM (Ollama/Mistral or Gemini) over HTTP
//! - [`BertClassifier`]: BERT sentiment model combined with the rules
//!
//! The [`ClassifierRegistry`] owns the configured backends and falls back to
//! the rules when a requested backend is missing or fails.

pub mod bert;
pub mod llm;
pub mod registry;
pub mod rules;

pub use bert::{BertClassifier, SentimentModel, StarPrediction};
pub use llm::{LlmClassifier, LlmClient, LlmProvider};
pub use registry::{BackendStatus, ClassificationOutcome, ClassifierRegistry};
pub use rules::RuleClassifier;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::labels::{Category, Incident, Sentiment, Topic, Urgency};

/// Backend that produced a classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Llm,
    Bert,
    Rules,
}

impl Backend {
    pub fn all() -> &'static [Backend] {
        &[Backend::Llm, Backend::Bert, Backend::Rules]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Llm => "llm",
            Backend::Bert => "bert",
            Backend::Rules => "rules",
        }
    }

    /// Human-readable label for the dashboard
    pub fn label(&self) -> &'static str {
        match self {
            Backend::Llm => "LLM",
            Backend::Bert => "BERT",
            Backend::Rules => "Rules",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Backend {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "llm" | "mistral" | "ollama" | "gemini" => Ok(Backend::Llm),
            "bert" => Ok(Backend::Bert),
            "rules" | "rule" | "regles" | "fallback" => Ok(Backend::Rules),
            other => Err(ClassifyError::UnknownBackend(other.to_string())),
        }
    }
}

/// Classification result for one message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub sentiment: Sentiment,
    pub is_claim: bool,
    pub urgency: Urgency,
    pub topic: Topic,
    pub incident: Incident,
    pub category: Category,
    /// Confidence in [0, 1]
    pub confidence: f32,
    pub backend: Backend,
    pub classified_at: DateTime<Utc>,
}

impl Classification {
    /// Neutral result used to pad incomplete backend responses
    pub fn neutral(backend: Backend) -> Self {
        Self {
            sentiment: Sentiment::Neutre,
            is_claim: false,
            urgency: Urgency::Faible,
            topic: Topic::Autre,
            incident: Incident::Aucun,
            category: Category::Autre,
            confidence: 0.5,
            backend,
            classified_at: Utc::now(),
        }
    }
}

/// Common trait for all classifier backends
///
/// Implementations return exactly one classification per input text,
/// in input order.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Which backend this is
    fn backend(&self) -> Backend;

    /// Classify a batch of texts
    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Classification>, ClassifyError>;
}

/// Errors that can occur during classification
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("{0} backend unavailable: {1}")]
    Unavailable(Backend, String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("LLM API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid LLM response: {0}")]
    InvalidResponse(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Backend returned {actual} results for {expected} texts")]
    CountMismatch { expected: usize, actual: usize },
}

/// Clamp a model confidence into the range shown on the dashboard
pub(crate) fn clamp_confidence(value: f32) -> f32 {
    value.clamp(0.40, 0.99)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("mistral".parse::<Backend>().unwrap(), Backend::Llm);
        assert_eq!("Gemini".parse::<Backend>().unwrap(), Backend::Llm);
        assert_eq!("bert".parse::<Backend>().unwrap(), Backend::Bert);
        assert_eq!(" rules ".parse::<Backend>().unwrap(), Backend::Rules);
        assert!("svm".parse::<Backend>().is_err());
    }

    #[test]
    fn test_confidence_clamp() {
        assert_eq!(clamp_confidence(0.1), 0.40);
        assert_eq!(clamp_confidence(1.5), 0.99);
        assert_eq!(clamp_confidence(0.8), 0.8);
    }
}
