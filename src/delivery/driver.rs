//! Single-part delivery with a timeout budget and failure capture.

use std::{panic::AssertUnwindSafe, time::Duration};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::time::timeout;
use tracing::{debug, error, instrument, warn};

use crate::{
    base::types::{MessageId, Recipient},
    service::transport::{TransportClient, TransportError, TransportErrorKind},
};

/// Outcome of one delivery attempt.
pub type DeliveryResult = Result<MessageId, TransportError>;

/// Emits one payload to one recipient through the transport.
///
/// Every failure mode (transport refusal, timeout, panic inside the transport) comes back
/// as a [`TransportError`] value. The driver never retries.
#[derive(Clone)]
pub struct DeliveryDriver {
    transport: TransportClient,
    timeout: Duration,
}

impl DeliveryDriver {
    pub fn new(transport: TransportClient, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Delivers `payload` now, or at `scheduled_at` when that lies in the future.
    #[instrument(skip(self, payload), fields(chars = payload.chars().count()))]
    pub async fn deliver(&self, recipient: &Recipient, payload: &str, scheduled_at: Option<DateTime<Utc>>) -> DeliveryResult {
        let scheduled_at = scheduled_at.filter(|at| *at > Utc::now());

        let send = AssertUnwindSafe(async { self.transport.send(recipient, payload, scheduled_at).await }).catch_unwind();

        match timeout(self.timeout, send).await {
            Ok(Ok(Ok(id))) => {
                debug!(%id, "Delivered.");
                Ok(id)
            }
            Ok(Ok(Err(err))) => {
                warn!(%err, "Transport refused delivery.");
                Err(err)
            }
            Ok(Err(_)) => {
                error!("Transport panicked during delivery.");
                Err(TransportError::new(TransportErrorKind::Rejected, "transport_panic", "The transport failed unexpectedly."))
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "Delivery timed out.");
                Err(TransportError::timeout(self.timeout))
            }
        }
    }
}
