//! Event handling and user interactions for relay-bot.
//!
//! This module turns webhook input into delivery work:
//! - Classifying inbound messages as fresh requests, continue requests, or noise
//! - Generating replies and starting delivery sessions
//! - The administrative manual send path

pub mod inbound;
pub mod manual_send;
