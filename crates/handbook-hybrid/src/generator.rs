//! Alternative phrasings from an OpenAI-compatible chat endpoint.

use std::time::Duration;

use async_trait::async_trait;
use handbook_core::config::OpenAiSettings;
use handbook_core::error::{Error, Result};
use handbook_core::traits::QueryGenerator;
use serde_json::{json, Value};
use tracing::debug;

use crate::multi_query::MAX_QUERIES;

const SYSTEM_PROMPT: &str = "You rewrite questions about the MAGMA computational algebra handbook \
into alternative search queries. Answer with one query per line and nothing else.";

pub struct OpenAiQueryGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    count: usize,
}

impl OpenAiQueryGenerator {
    pub fn new(settings: &OpenAiSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Network(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            model: settings.chat_model.clone(),
            count: MAX_QUERIES,
        })
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count.max(1);
        self
    }
}

/// One phrasing per line, with list markers (`1.`, `2)`, `-`, `*`) removed.
pub fn parse_alternatives(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            let line = line.trim();
            let digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
            let line = match digits.strip_prefix(['.', ')']) {
                Some(rest) if digits.len() < line.len() => rest,
                _ => line,
            };
            line.trim_start_matches(['-', '*']).trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

#[async_trait]
impl QueryGenerator for OpenAiQueryGenerator {
    async fn generate_alternatives(&self, question: &str) -> Result<Vec<String>> {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": format!("Write {} different versions of this question:\n{question}", self.count)},
            ],
        });
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("chat request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::from_status(status.as_u16(), &text, Error::Generation));
        }
        let parsed: Value = response.json().await.map_err(|e| Error::Generation(format!("chat response: {e}")))?;
        let content = parsed["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| Error::Generation("chat response has no message content".to_string()))?;
        let mut alternatives = parse_alternatives(content);
        alternatives.truncate(self.count);
        debug!(n = alternatives.len(), "generated alternative queries");
        Ok(alternatives)
    }
}
