//! LLM Provider Client
//!
//! HTTP client for the hosted language models used as a classifier backend:
//! - Ollama (local Mistral): `POST /api/generate`
//! - Google Gemini: `POST /v1beta/models/{model}:generateContent`
//!
//! One call to [`LlmClient::generate`] is one attempt; retries and fallback
//! live in the classifier.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::classify::{Backend, ClassifyError};
use crate::config::LlmConfig;

/// Which hosted model API to talk to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Local Ollama server (Mistral by default)
    #[default]
    Ollama,
    /// Google Gemini REST API
    Gemini,
}

impl LlmProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "http://localhost:11434",
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "mistral",
            LlmProvider::Gemini => "gemini-1.5-flash",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Ollama => write!(f, "ollama"),
            LlmProvider::Gemini => write!(f, "gemini"),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" | "mistral" => Ok(LlmProvider::Ollama),
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            other => Err(ClassifyError::Unavailable(
                Backend::Llm,
                format!("unknown provider '{}'", other),
            )),
        }
    }
}

/// LLM REST API client
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new client with the given configuration
    pub fn new(config: LlmConfig) -> Result<Self, ClassifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Get the current configuration
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    /// Configured base URL, or the provider default
    pub fn base_url(&self) -> String {
        self.config
            .base_url
            .clone()
            .unwrap_or_else(|| self.config.provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Configured model name, or the provider default
    pub fn model(&self) -> String {
        self.config
            .model
            .clone()
            .unwrap_or_else(|| self.config.provider.default_model().to_string())
    }

    /// Check that the provider is reachable
    ///
    /// Ollama lists its models; Gemini requires an API key and looks up the model.
    /// The check is bounded by `health_timeout_ms`, not the generation timeout.
    pub async fn health_check(&self) -> Result<(), ClassifyError> {
        let request = match self.config.provider {
            LlmProvider::Ollama => self.client.get(format!("{}/api/tags", self.base_url())),
            LlmProvider::Gemini => {
                let key = self.api_key()?;
                self.client
                    .get(format!("{}/v1beta/models/{}", self.base_url(), self.model()))
                    .query(&[("key", key)])
            }
        };

        let response = request
            .timeout(Duration::from_millis(self.config.health_timeout_ms))
            .send()
            .await
            .map_err(map_request_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ClassifyError::Unavailable(
                Backend::Llm,
                format!("{} answered HTTP {}", self.config.provider, response.status()),
            ))
        }
    }

    /// Send one prompt and return the generated text
    pub async fn generate(&self, prompt: &str) -> Result<String, ClassifyError> {
        match self.config.provider {
            LlmProvider::Ollama => self.generate_ollama(prompt).await,
            LlmProvider::Gemini => self.generate_gemini(prompt).await,
        }
    }

    async fn generate_ollama(&self, prompt: &str) -> Result<String, ClassifyError> {
        let url = format!("{}/api/generate", self.base_url());

        let body = OllamaGenerateRequest {
            model: self.model(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_output_tokens,
                top_p: self.config.top_p,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let result: OllamaGenerateResponse = response.json().await?;
        Ok(result.response)
    }

    async fn generate_gemini(&self, prompt: &str) -> Result<String, ClassifyError> {
        let key = self.api_key()?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url(),
            self.model()
        );

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let result: GeminiResponse = response.json().await?;
        result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ClassifyError::InvalidResponse("Gemini returned no candidates".into()))
    }

    fn api_key(&self) -> Result<&str, ClassifyError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ClassifyError::Unavailable(
                    Backend::Llm,
                    "Gemini requires GEMINI_API_KEY or GOOGLE_API_KEY".to_string(),
                )
            })
    }
}

fn map_request_error(e: reqwest::Error) -> ClassifyError {
    if e.is_timeout() {
        ClassifyError::Timeout
    } else if e.is_connect() {
        ClassifyError::Unavailable(Backend::Llm, e.to_string())
    } else {
        ClassifyError::Request(e)
    }
}

async fn api_error(response: reqwest::Response) -> ClassifyError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    ClassifyError::Api {
        status: status.as_u16(),
        message: text,
    }
}

// ============================================
// Request/Response DTOs
// ============================================

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}
