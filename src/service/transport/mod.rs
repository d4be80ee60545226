pub mod twilio;

use std::{fmt, ops::Deref, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::base::types::{MessageId, Recipient};

// Types.

/// Coarse classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// The transport is throttling this sender or recipient.
    RateLimited,
    /// The address is malformed, unreachable, or not opted in.
    InvalidRecipient,
    /// The body exceeds the transport's size limit.
    PayloadTooLarge,
    /// A scheduled send was refused (window out of range, scheduling not configured).
    SchedulingRejected,
    /// The request never got a transport answer.
    Network,
    /// The request did not finish within the delivery budget.
    Timeout,
    /// Any other refusal.
    Rejected,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RateLimited => "rate limited",
            Self::InvalidRecipient => "invalid recipient",
            Self::PayloadTooLarge => "payload too large",
            Self::SchedulingRejected => "scheduling rejected",
            Self::Network => "network failure",
            Self::Timeout => "timed out",
            Self::Rejected => "rejected",
        };

        f.write_str(name)
    }
}

/// A failed delivery as reported by (or on behalf of) the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind} [{code}]: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// Machine-usable code; the transport's own code when it sent one.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(TransportErrorKind::Timeout, "timeout", format!("No transport response within {}s.", after.as_secs_f32()))
    }

    pub fn network(err: impl fmt::Display) -> Self {
        Self::new(TransportErrorKind::Network, "network", err.to_string())
    }
}

// Traits.

/// Generic messaging transport that clients must implement.
///
/// One call is one outbound message; implementations do not retry.
#[async_trait]
pub trait GenericTransport: Send + Sync + 'static {
    /// Sends `payload` to `recipient`.
    ///
    /// With `scheduled_at`, the transport is asked to hold the message until that time.
    /// A transport that cannot schedule must fail rather than send immediately.
    async fn send(&self, recipient: &Recipient, payload: &str, scheduled_at: Option<DateTime<Utc>>) -> Result<MessageId, TransportError>;
}

// Structs.

/// Transport client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct TransportClient {
    inner: Arc<dyn GenericTransport>,
}

impl Deref for TransportClient {
    type Target = dyn GenericTransport;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl TransportClient {
    pub fn new(inner: Arc<dyn GenericTransport>) -> Self {
        Self { inner }
    }
}
