//! DeepAI text generator client.
//!
//! `POST` the prompt as the `text` form field with an `api-key` header; the generated
//! text comes back in the `output` field of the JSON body.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::base::{config::Config, types::Res};

use super::{GenericLlmClient, LlmClient};

// Extra methods on `LlmClient` applied by the deepai implementation.

impl LlmClient {
    pub fn deepai(config: &Config) -> Self {
        let client = DeepAiLlmClient::new(config);
        Self { inner: Arc::new(client) }
    }
}

/// Text generator response body.
#[derive(Debug, Deserialize)]
struct DeepAiResponse {
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    err: Option<String>,
}

/// DeepAI LLM client implementation.
#[derive(Clone)]
pub struct DeepAiLlmClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl DeepAiLlmClient {
    /// Create a new DeepAI client.
    #[instrument(name = "DeepAiLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.deepai_endpoint.clone(),
            api_key: config.deepai_api_key.clone(),
            timeout: config.generation_timeout(),
        }
    }
}

#[async_trait]
impl GenericLlmClient for DeepAiLlmClient {
    #[instrument(name = "DeepAiLlmClient::generate", skip_all)]
    async fn generate(&self, prompt: &str) -> Res<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .form(&[("text", prompt)])
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let body: DeepAiResponse = response.json().await?;

        if let Some(err) = body.err {
            return Err(anyhow::anyhow!("DeepAI returned an error: {err}"));
        }

        let output = body.output.unwrap_or_default();
        debug!(chars = output.chars().count(), "DeepAI generated text.");

        Ok(output)
    }
}
