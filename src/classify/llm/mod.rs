//! LLM Classification Backend
//!
//! Sends chunks of messages to a hosted model and maps the JSON answer onto
//! the fixed label sets. Chunks that keep failing after the configured
//! retries are classified by the rules instead.

mod client;
pub mod prompt;

pub use client::{LlmClient, LlmProvider};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{Backend, Classification, Classifier, ClassifyError, RuleClassifier};

/// Classifier backed by an [`LlmClient`]
pub struct LlmClassifier {
    client: LlmClient,
    rules: Arc<RuleClassifier>,
    batch_size: usize,
    max_retries: u32,
    retry_delay: Duration,
    inter_batch_delay: Duration,
}

impl LlmClassifier {
    pub fn new(client: LlmClient, rules: Arc<RuleClassifier>) -> Self {
        let config = client.config();
        let batch_size = config.batch_size.max(1);
        let max_retries = config.max_retries.max(1);
        let retry_delay = Duration::from_millis(config.retry_delay_ms);
        let inter_batch_delay = Duration::from_millis(config.inter_batch_delay_ms);

        Self {
            client,
            rules,
            batch_size,
            max_retries,
            retry_delay,
            inter_batch_delay,
        }
    }

    pub fn client(&self) -> &LlmClient {
        &self.client
    }

    /// One attempt at a chunk: generate, parse, apply guards
    async fn attempt(&self, chunk: &[String]) -> Result<Vec<Classification>, ClassifyError> {
        let prompt = prompt::build_prompt(chunk);
        let answer = self.client.generate(&prompt).await?;
        let mut results = prompt::parse_response(&answer, chunk.len())?;
        prompt::apply_quality_guards(chunk, &mut results);
        Ok(results)
    }

    async fn classify_chunk(&self, chunk: &[String]) -> Vec<Classification> {
        for attempt in 1..=self.max_retries {
            tracing::debug!(
                provider = %self.client.provider(),
                texts = chunk.len(),
                attempt = attempt,
                "Calling LLM"
            );

            match self.attempt(chunk).await {
                Ok(results) => return results,
                Err(e) => {
                    tracing::warn!(
                        provider = %self.client.provider(),
                        attempt = attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "LLM classification attempt failed"
                    );
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        tracing::warn!(
            texts = chunk.len(),
            "LLM retries exhausted, classifying chunk with rules"
        );
        self.rules.classify_all(chunk)
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    fn backend(&self) -> Backend {
        Backend::Llm
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Classification>, ClassifyError> {
        let mut results = Vec::with_capacity(texts.len());
        let chunks = texts.chunks(self.batch_size);
        let total = chunks.len();

        for (i, chunk) in chunks.enumerate() {
            results.extend(self.classify_chunk(chunk).await);

            if i + 1 < total && !self.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.inter_batch_delay).await;
            }
        }

        tracing::info!(
            texts = texts.len(),
            chunks = total,
            "LLM classification complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::labels::{Sentiment, Urgency};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn classifier_for(server: &MockServer, batch_size: usize) -> LlmClassifier {
        let config = LlmConfig {
            base_url: Some(server.uri()),
            batch_size,
            max_retries: 2,
            retry_delay_ms: 0,
            inter_batch_delay_ms: 0,
            ..LlmConfig::default()
        };
        let client = LlmClient::new(config).unwrap();
        LlmClassifier::new(client, Arc::new(RuleClassifier::new()))
    }

    fn ollama_answer(results: serde_json::Value) -> ResponseTemplate {
        let inner = serde_json::json!({ "results": results }).to_string();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "mistral",
            "response": format!("Voici la classification:\n{}", inner),
            "done": true
        }))
    }

    #[tokio::test]
    async fn test_classify_batch_parses_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ollama_answer(serde_json::json!([
                {"index": 0, "sentiment": "positif", "categorie": "produit", "score_confiance": 0.9,
                 "is_claim": "non", "urgence": "faible", "topics": "mobile", "incident": "aucun"},
                {"index": 1, "sentiment": "negatif", "categorie": "support", "score_confiance": 0.8,
                 "is_claim": "oui", "urgence": "haute", "topics": "fibre", "incident": "panne_connexion"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let classifier = classifier_for(&server, 50);
        let texts = vec!["J'adore mon forfait".to_string(), "Fibre coupée".to_string()];
        let results = classifier.classify_batch(&texts).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].sentiment, Sentiment::Positif);
        assert_eq!(results[0].backend, Backend::Llm);
        assert_eq!(results[1].urgency, Urgency::Haute);
        assert!(results[1].is_claim);
    }

    #[tokio::test]
    async fn test_chunks_by_batch_size() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ollama_answer(serde_json::json!([{"index": 0, "sentiment": "neutre"}])))
            .expect(3)
            .mount(&server)
            .await;

        let classifier = classifier_for(&server, 1);
        let texts: Vec<String> = (0..3).map(|i| format!("message {}", i)).collect();
        let results = classifier.classify_batch(&texts).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_falls_back_to_rules_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let classifier = classifier_for(&server, 50);
        let texts = vec!["Panne internet urgent".to_string(), "Merci".to_string()];
        let results = classifier.classify_batch(&texts).await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.backend == Backend::Rules));
        assert!(results[0].is_claim);
    }

    #[tokio::test]
    async fn test_invalid_json_triggers_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "Je ne sais pas"
            })))
            .mount(&server)
            .await;

        let classifier = classifier_for(&server, 50);
        let results = classifier
            .classify_batch(&["Bonjour".to_string()])
            .await
            .unwrap();
        assert_eq!(results[0].backend, Backend::Rules);
    }
}
