//! Backend registry with rule-based fallback

use serde::Serialize;
use std::sync::Arc;

use super::{
    Backend, BertClassifier, Classification, Classifier, ClassifyError, LlmClassifier,
    LlmClient, RuleClassifier,
};
use crate::config::Config;

/// Availability of one backend, shown on the dashboard and `/api/v1/backends`
#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub backend: Backend,
    pub label: &'static str,
    pub available: bool,
    pub is_default: bool,
    pub detail: String,
}

/// Results of one registry call
#[derive(Debug, Clone)]
pub struct ClassificationOutcome {
    /// Backend that was asked for
    pub requested: Backend,
    pub results: Vec<Classification>,
    /// Whether the rules had to stand in for the requested backend
    pub fallback: bool,
    /// Number of results not produced by the requested backend
    pub fallback_count: usize,
}

/// Owns the configured backends
pub struct ClassifierRegistry {
    rules: Arc<RuleClassifier>,
    llm: Option<LlmClassifier>,
    bert: Option<BertClassifier>,
    /// Why a backend is missing
    llm_unavailable: Option<String>,
    bert_unavailable: Option<String>,
    default_backend: Backend,
}

impl ClassifierRegistry {
    /// Registry with only the rules backend
    pub fn rules_only() -> Self {
        Self {
            rules: Arc::new(RuleClassifier::new()),
            llm: None,
            bert: None,
            llm_unavailable: Some("not configured".to_string()),
            bert_unavailable: Some("not configured".to_string()),
            default_backend: Backend::Rules,
        }
    }

    /// Build the backends enabled in the configuration
    ///
    /// A backend that cannot be constructed is logged and left out; the
    /// registry itself never fails.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::rules_only();
        registry.default_backend = config.classifier.default_backend;

        if config.llm.enabled {
            match LlmClient::new(config.llm.clone()) {
                Ok(client) => {
                    registry.llm = Some(LlmClassifier::new(client, Arc::clone(&registry.rules)));
                    registry.llm_unavailable = None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to build LLM client");
                    registry.llm_unavailable = Some(e.to_string());
                }
            }
        } else {
            registry.llm_unavailable = Some("disabled in configuration".to_string());
        }

        if config.bert.enabled {
            match BertClassifier::load(&config.bert, Arc::clone(&registry.rules)) {
                Ok(bert) => {
                    registry.bert = Some(bert);
                    registry.bert_unavailable = None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "BERT backend unavailable");
                    registry.bert_unavailable = Some(e.to_string());
                }
            }
        } else {
            registry.bert_unavailable = Some("disabled in configuration".to_string());
        }

        registry
    }

    pub fn with_llm(mut self, llm: LlmClassifier) -> Self {
        self.llm = Some(llm);
        self.llm_unavailable = None;
        self
    }

    pub fn with_bert(mut self, bert: BertClassifier) -> Self {
        self.bert = Some(bert);
        self.bert_unavailable = None;
        self
    }

    pub fn with_default(mut self, backend: Backend) -> Self {
        self.default_backend = backend;
        self
    }

    pub fn default_backend(&self) -> Backend {
        self.default_backend
    }

    fn get(&self, backend: Backend) -> Option<&dyn Classifier> {
        match backend {
            Backend::Llm => self.llm.as_ref().map(|c| c as &dyn Classifier),
            Backend::Bert => self.bert.as_ref().map(|c| c as &dyn Classifier),
            Backend::Rules => Some(self.rules.as_ref() as &dyn Classifier),
        }
    }

    /// Classify with the requested backend, or the default when `None`
    pub async fn classify(&self, backend: Option<Backend>, texts: &[String]) -> ClassificationOutcome {
        let requested = backend.unwrap_or(self.default_backend);

        let attempt = match self.get(requested) {
            Some(classifier) => classifier
                .classify_batch(texts)
                .await
                .and_then(|results| {
                    if results.len() == texts.len() {
                        Ok(results)
                    } else {
                        Err(ClassifyError::CountMismatch {
                            expected: texts.len(),
                            actual: results.len(),
                        })
                    }
                }),
            None => Err(ClassifyError::Unavailable(
                requested,
                self.unavailable_reason(requested)
                    .unwrap_or("not configured")
                    .to_string(),
            )),
        };

        let results = match attempt {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(
                    backend = %requested,
                    texts = texts.len(),
                    error = %e,
                    "Backend failed, falling back to rules"
                );
                self.rules.classify_all(texts)
            }
        };

        let fallback_count = results.iter().filter(|r| r.backend != requested).count();

        ClassificationOutcome {
            requested,
            fallback: fallback_count > 0,
            fallback_count,
            results,
        }
    }

    fn unavailable_reason(&self, backend: Backend) -> Option<&str> {
        match backend {
            Backend::Llm => self.llm_unavailable.as_deref(),
            Backend::Bert => self.bert_unavailable.as_deref(),
            Backend::Rules => None,
        }
    }

    /// Report each backend's availability
    ///
    /// The LLM is probed with its provider health check.
    pub async fn status(&self) -> Vec<BackendStatus> {
        let mut statuses = Vec::with_capacity(3);

        for &backend in Backend::all() {
            let (available, detail) = match backend {
                Backend::Llm => match &self.llm {
                    Some(llm) => {
                        let client = llm.client();
                        let target = format!("{} ({})", client.provider(), client.model());
                        match client.health_check().await {
                            Ok(()) => (true, target),
                            Err(e) => (false, format!("{}: {}", target, e)),
                        }
                    }
                    None => (false, self.unavailable_reason(backend).unwrap_or_default().to_string()),
                },
                Backend::Bert => match &self.bert {
                    Some(_) => (true, "model loaded".to_string()),
                    None => (false, self.unavailable_reason(backend).unwrap_or_default().to_string()),
                },
                Backend::Rules => (true, "keyword rules".to_string()),
            };

            statuses.push(BackendStatus {
                backend,
                label: backend.label(),
                available,
                is_default: backend == self.default_backend,
                detail,
            });
        }

        statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{SentimentModel, StarPrediction};
    use crate::config::LlmConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FailingModel;

    impl SentimentModel for FailingModel {
        fn predict(&self, _texts: &[String]) -> Result<Vec<StarPrediction>, ClassifyError> {
            Err(ClassifyError::Model("out of memory".to_string()))
        }
    }

    fn texts() -> Vec<String> {
        vec!["Panne fibre".to_string(), "Merci Free".to_string()]
    }

    #[tokio::test]
    async fn test_rules_backend() {
        let outcome = ClassifierRegistry::rules_only()
            .classify(Some(Backend::Rules), &texts())
            .await;
        assert_eq!(outcome.results.len(), 2);
        assert!(!outcome.fallback);
        assert_eq!(outcome.requested, Backend::Rules);
    }

    #[tokio::test]
    async fn test_missing_backend_falls_back() {
        let outcome = ClassifierRegistry::rules_only()
            .classify(Some(Backend::Llm), &texts())
            .await;
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.fallback);
        assert_eq!(outcome.fallback_count, 2);
        assert!(outcome.results.iter().all(|r| r.backend == Backend::Rules));
    }

    #[tokio::test]
    async fn test_failing_backend_falls_back() {
        let rules = Arc::new(RuleClassifier::new());
        let bert = BertClassifier::new(Arc::new(FailingModel), rules, 8);
        let registry = ClassifierRegistry::rules_only()
            .with_bert(bert)
            .with_default(Backend::Bert);

        let outcome = registry.classify(None, &texts()).await;
        assert_eq!(outcome.requested, Backend::Bert);
        assert!(outcome.fallback);
        assert_eq!(outcome.results.len(), 2);
    }

    #[tokio::test]
    async fn test_status_checks_llm() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
            .mount(&server)
            .await;

        let config = LlmConfig {
            base_url: Some(server.uri()),
            ..LlmConfig::default()
        };
        let llm = LlmClassifier::new(
            LlmClient::new(config).unwrap(),
            Arc::new(RuleClassifier::new()),
        );
        let registry = ClassifierRegistry::rules_only().with_llm(llm);

        let statuses = registry.status().await;
        assert_eq!(statuses.len(), 3);
        assert!(statuses[0].available, "llm: {}", statuses[0].detail);
        assert!(!statuses[1].available);
        assert!(statuses[2].available);
        assert!(statuses[2].is_default);
    }
}
