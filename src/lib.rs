//! Library root for `relay-bot`.
//!
//! Relay-bot answers WhatsApp messages with generated text and is designed to:
//! - Generate replies (e.g. Instagram captions) with a pluggable text generator
//! - Split replies longer than the transport limit into numbered parts
//! - Deliver the first part at once and the rest on "next" requests, or all at once
//!   with transport-side scheduled send times
//! - Keep each part failure attributable to the exact part that failed
//!
//! The bot integrates with Twilio for messaging and DeepAI or OpenAI for text
//! generation. The architecture is built around extensible traits that allow for
//! different implementations of each service.

pub mod base;
pub mod delivery;
pub mod interaction;
pub mod prelude;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the relay-bot runtime:
/// - Creates the runtime context with generator, transport, and pending store
/// - Serves the webhook endpoints until shutdown
pub async fn start(config: Config) -> Void {
    info!("Starting relay-bot ...");

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config)?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
