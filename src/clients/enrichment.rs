//! Generative text used to enrich stops (Gemini `generateContent`)
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Instrument, debug, info_span};

use crate::utils::strip_newlines;

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("text generation request failed: {0}")]
    Request(String),

    #[error("text generation returned HTTP {0}")]
    Status(u16),

    #[error("unexpected text generation response: {0}")]
    Parse(String),

    #[error("text generation returned no text")]
    Empty,
}

impl From<reqwest::Error> for EnrichmentError {
    fn from(err: reqwest::Error) -> Self {
        EnrichmentError::Request(err.to_string())
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, EnrichmentError>;
}

/// Normalizes whatever the generator returns into single-line prose
#[derive(Clone)]
pub struct Enrichment {
    generator: Arc<dyn TextGenerator>,
}

impl Enrichment {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, EnrichmentError> {
        let text = self.generator.generate(prompt).await?;

        Ok(strip_newlines(&text))
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, EnrichmentError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnrichmentError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    #[tracing::instrument(err, skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, EnrichmentError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        };
        let body =
            serde_json::to_string(&request).map_err(|e| EnrichmentError::Parse(e.to_string()))?;

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .instrument(info_span!("Generating text"))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let response: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| EnrichmentError::Parse(e.to_string()))?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).join(""))
            .filter(|t| !t.trim().is_empty())
            .ok_or(EnrichmentError::Empty)?;

        debug!(text_len = text.len(), "Generated text");

        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}
