//! The long-message delivery engine.
//!
//! Leaves first:
//! - [`chunker`] splits a text into size-bounded parts at word boundaries.
//! - [`render`] decorates parts with `(i/total)` headers and "reply for more" hints.
//! - [`store`] keeps the undelivered parts of each recipient.
//! - [`driver`] sends one part through the transport and captures every failure.
//! - [`session`] ties them together into start and continue operations.

pub mod chunker;
pub mod driver;
pub mod render;
pub mod session;
pub mod store;
