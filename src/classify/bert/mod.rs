//! BERT Classification Backend
//!
//! Sentiment comes from a 5-star BERT model (nlptown multilingual sentiment
//! checkpoint), calibrated with telecom keywords. Claim, urgency, topic and
//! incident come from the rules; the reported confidence is the mean of both.

#[cfg(feature = "bert")]
mod model;

#[cfg(feature = "bert")]
pub use model::CandleSentimentModel;

use async_trait::async_trait;
use std::sync::Arc;

use super::{clamp_confidence, Backend, Classification, Classifier, ClassifyError, RuleClassifier};
use crate::config::BertConfig;
use crate::labels::Sentiment;

const NEGATIVE_KEYWORDS: &[&str] = &[
    "panne",
    "bug",
    "incident",
    "bloque",
    "bloqué",
    "lent",
    "probleme",
    "problème",
    "facture",
    "debit",
    "débit",
    "impossible",
    "erreur",
    "coupure",
    "sav",
];

const POSITIVE_KEYWORDS: &[&str] = &[
    "merci",
    "bravo",
    "super",
    "génial",
    "rapide",
    "parfait",
    "satisfait",
    "content",
    "excellent",
    "top",
    "formidable",
];

/// Most likely star class (0..=4) and its softmax probability
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StarPrediction {
    pub stars: usize,
    pub probability: f32,
}

/// A synchronous 5-class sentiment model
///
/// Called from a blocking thread.
pub trait SentimentModel: Send + Sync {
    fn predict(&self, texts: &[String]) -> Result<Vec<StarPrediction>, ClassifyError>;
}

/// Map a star class onto a sentiment
pub fn stars_to_sentiment(stars: usize) -> Sentiment {
    match stars {
        0 | 1 => Sentiment::Negatif,
        2 => Sentiment::Neutre,
        _ => Sentiment::Positif,
    }
}

/// Adjust a raw model sentiment with telecom keywords.
pub fn calibrate(sentiment: Sentiment, confidence: f32, text: &str) -> (Sentiment, f32) {
    let lowered = text.to_lowercase();
    let has_negative = NEGATIVE_KEYWORDS.iter().any(|k| lowered.contains(k));
    let has_positive = POSITIVE_KEYWORDS.iter().any(|k| lowered.contains(k));

    let (sentiment, confidence) = if has_negative {
        (Sentiment::Negatif, confidence.max(0.75))
    } else if sentiment == Sentiment::Neutre && has_positive {
        (Sentiment::Positif, confidence.max(0.70))
    } else {
        (sentiment, confidence)
    };

    (sentiment, clamp_confidence(confidence))
}

/// BERT sentiment combined with rule-based labels
pub struct BertClassifier {
    model: Arc<dyn SentimentModel>,
    rules: Arc<RuleClassifier>,
    batch_size: usize,
}

impl BertClassifier {
    pub fn new(model: Arc<dyn SentimentModel>, rules: Arc<RuleClassifier>, batch_size: usize) -> Self {
        Self {
            model,
            rules,
            batch_size: batch_size.max(1),
        }
    }

    /// Load the configured checkpoint
    #[cfg(feature = "bert")]
    pub fn load(config: &BertConfig, rules: Arc<RuleClassifier>) -> Result<Self, ClassifyError> {
        let dir = config.model_dir.as_ref().ok_or_else(|| {
            ClassifyError::Unavailable(Backend::Bert, "bert.model_dir is not set".to_string())
        })?;
        let model = CandleSentimentModel::load(dir, config.use_cpu, config.max_length)?;
        Ok(Self::new(Arc::new(model), rules, config.batch_size))
    }

    /// Load the configured checkpoint
    #[cfg(not(feature = "bert"))]
    pub fn load(_config: &BertConfig, _rules: Arc<RuleClassifier>) -> Result<Self, ClassifyError> {
        Err(ClassifyError::Unavailable(
            Backend::Bert,
            "built without the `bert` feature".to_string(),
        ))
    }

    fn merge(&self, text: &str, prediction: StarPrediction) -> Classification {
        let (sentiment, bert_confidence) =
            calibrate(stars_to_sentiment(prediction.stars), prediction.probability, text);
        let rules = self.rules.classify(text);

        Classification {
            sentiment,
            confidence: (bert_confidence + rules.confidence) / 2.0,
            backend: Backend::Bert,
            ..rules
        }
    }
}

#[async_trait]
impl Classifier for BertClassifier {
    fn backend(&self) -> Backend {
        Backend::Bert
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Classification>, ClassifyError> {
        let mut results = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let model = Arc::clone(&self.model);
            let owned = chunk.to_vec();
            let predictions = tokio::task::spawn_blocking(move || model.predict(&owned))
                .await
                .map_err(|e| ClassifyError::Model(format!("inference task failed: {}", e)))??;

            if predictions.len() != chunk.len() {
                return Err(ClassifyError::CountMismatch {
                    expected: chunk.len(),
                    actual: predictions.len(),
                });
            }

            results.extend(
                chunk
                    .iter()
                    .zip(predictions)
                    .map(|(text, prediction)| self.merge(text, prediction)),
            );
        }

        tracing::debug!(texts = texts.len(), "BERT classification complete");
        Ok(results)
    }
}
