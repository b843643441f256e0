use std::time::Duration;

use async_trait::async_trait;
use handbook_core::config::{EmbeddingSettings, OpenAiSettings};
use handbook_core::error::{Error, Result};
use handbook_core::traits::Embedder;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
    id: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(openai: &OpenAiSettings, embedding: &EmbeddingSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(openai.timeout_secs))
            .build()
            .map_err(|e| Error::Network(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", openai.base_url.trim_end_matches('/')),
            api_key: openai.api_key.clone(),
            model: embedding.model.clone(),
            dimensions: embedding.dimensions,
            id: format!("openai:{}:d{}", embedding.model, embedding.dimensions),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dimensions }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Operation("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        debug!(n = texts.len(), model = %self.model, "embedding request");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbedRequest { model: &self.model, input: texts, dimensions: self.dimensions })
            .send()
            .await
            .map_err(|e| Error::Network(format!("embedding request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(status.as_u16(), &body, Error::Network));
        }

        let mut parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Operation(format!("embedding response: {e}")))?;
        if parsed.data.len() != texts.len() {
            return Err(Error::Operation(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}
