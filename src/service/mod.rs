//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for the services used by the relay-bot:
//! - Text generation (e.g., DeepAI, OpenAI)
//! - Messaging transports (e.g., Twilio WhatsApp)
//! - The inbound webhook server
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod llm;
pub mod transport;
pub mod webhook;
