pub mod deepai;
pub mod openai;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::{
    config::Config,
    types::{GeneratorKind, Res},
};

// Traits.

/// Generic text-generation client trait that clients must implement.
///
/// This trait defines the one operation the bot needs from a generator: turn a user
/// prompt into reply text. Implementing it allows different providers to be used.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// Generate reply text for `prompt`.
    ///
    /// An empty string is a valid return; callers substitute their fallback reply.
    async fn generate(&self, prompt: &str) -> Res<String>;
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>) -> Self {
        Self { inner }
    }

    /// Builds the client selected by `generator` in the configuration.
    pub fn from_config(config: &Config) -> Self {
        match config.generator {
            GeneratorKind::Deepai => Self::deepai(config),
            GeneratorKind::Openai => Self::openai(config),
        }
    }
}
