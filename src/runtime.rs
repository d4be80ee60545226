//! Runtime services and shared state for the relay-bot.

use tracing::instrument;

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    delivery::{
        driver::DeliveryDriver,
        session::{SessionController, SessionSettings},
        store::PendingStore,
    },
    service::{llm::LlmClient, transport::TransportClient, webhook},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the configuration, the generator, and the session controller.
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The text-generation client instance.
    pub llm: LlmClient,
    /// The delivery session controller.
    pub sessions: SessionController,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub fn new(config: Config) -> Res<Self> {
        // Initialize the generator.
        let llm = LlmClient::from_config(&config);

        // Initialize the transport.
        let transport = TransportClient::twilio(&config)?;

        Ok(Self::with_services(config, llm, transport, PendingStore::memory()))
    }

    /// Assemble a runtime from already-built services.
    pub fn with_services(config: Config, llm: LlmClient, transport: TransportClient, store: PendingStore) -> Self {
        let driver = DeliveryDriver::new(transport, config.delivery_timeout());
        let sessions = SessionController::new(store, driver, SessionSettings::from_config(&config));

        Self { config, llm, sessions }
    }

    pub async fn start(&self) -> Void {
        webhook::serve(self.clone()).await
    }
}
