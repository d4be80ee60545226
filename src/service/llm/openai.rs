//! Integration with OpenAI chat completions.
//!
//! The configured generation directive is sent as the system message and the user's
//! prompt as the user message; the first choice's content is the reply.

use std::{sync::Arc, time::Duration};

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, CreateChatCompletionResponse},
};
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::base::{config::Config, types::Res};

use super::{GenericLlmClient, LlmClient};

// Extra methods on `LlmClient` applied by the openai implementation.

impl LlmClient {
    pub fn openai(config: &Config) -> Self {
        let client = OpenAiLlmClient::new(config);
        Self { inner: Arc::new(client) }
    }
}

// Specific implementations.

/// OpenAI LLM client implementation.
#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    config: Config,
}

impl OpenAiLlmClient {
    /// Create a new OpenAI LLM client.
    #[instrument(name = "OpenAiLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        let cfg = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());

        Self {
            client: Client::with_config(cfg),
            config: config.clone(),
        }
    }

    /// Build the chat completion request.
    fn build_request(&self, prompt: &str) -> Res<CreateChatCompletionRequestArgs> {
        let mut request = CreateChatCompletionRequestArgs::default();

        request
            .model(&self.config.openai_model)
            .max_completion_tokens(self.config.openai_max_tokens)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default().content(self.config.generation_directive.clone()).build()?.into(),
                ChatCompletionRequestUserMessageArgs::default().content(prompt.to_string()).build()?.into(),
            ]);

        Ok(request)
    }

    /// Helper function to make OpenAI API calls with retry logic and timeout handling.
    async fn call_openai_api(&self, request_builder: CreateChatCompletionRequestArgs) -> Res<CreateChatCompletionResponse> {
        const MAX_RETRIES: u32 = 2;
        const RETRY_DELAY_MS: u64 = 500;

        let budget = self.config.generation_timeout();
        let mut retries = 0;

        loop {
            let request = request_builder.build()?;
            let result = timeout(budget, self.client.chat().create(request)).await;

            match result {
                Ok(Ok(response)) => {
                    info!("OpenAI API call succeeded after {} attempts", retries + 1);
                    return Ok(response);
                }
                Ok(Err(err)) => {
                    if retries >= MAX_RETRIES {
                        return Err(anyhow::anyhow!("OpenAI API call failed after {MAX_RETRIES} retries: {err}"));
                    }
                    retries += 1;
                    warn!("OpenAI API call failed, retrying {retries}/{MAX_RETRIES}: {err}");
                }
                Err(_) => {
                    if retries >= MAX_RETRIES {
                        return Err(anyhow::anyhow!("OpenAI API call timed out after {MAX_RETRIES} retries"));
                    }
                    retries += 1;
                    warn!("OpenAI API call timed out, retrying {retries}/{MAX_RETRIES}");
                }
            }

            let delay = Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(retries - 1));
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl GenericLlmClient for OpenAiLlmClient {
    #[instrument(name = "OpenAiLlmClient::generate", skip_all)]
    async fn generate(&self, prompt: &str) -> Res<String> {
        let request = self.build_request(prompt)?;
        let response = self.call_openai_api(request).await?;

        let text = response.choices.into_iter().next().and_then(|choice| choice.message.content).unwrap_or_default();

        Ok(text)
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::config::ConfigInner;

    #[test]
    fn request_carries_directive_and_prompt() {
        let config = Config::from(ConfigInner {
            openai_api_key: "sk-test".to_string(),
            openai_model: "gpt-test".to_string(),
            generation_directive: "Write captions.".to_string(),
            ..Default::default()
        });

        let client = OpenAiLlmClient::new(&config);
        let request = client.build_request("a sunset over the bay").unwrap().build().unwrap();

        assert_eq!(request.model, "gpt-test");
        assert_eq!(request.messages.len(), 2);

        let json = serde_json::to_string(&request.messages).unwrap();
        assert!(json.contains("Write captions."));
        assert!(json.contains("a sunset over the bay"));
    }
}
