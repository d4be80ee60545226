//! Delivery sessions: split, send the first part, then drain on demand.
//!
//! Per recipient the controller moves between two states. `Idle` means the pending store
//! has no entry; `Draining` means at least one part is waiting for a continue request.
//! In scheduled mode a recipient never enters `Draining`, because every part is handed to
//! the transport when the session starts.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{DeliveryMode, MessageId, MessagePart, Recipient, SessionPolicy},
    },
    delivery::{
        driver::{DeliveryDriver, DeliveryResult},
        render::PartRenderer,
        store::{PendingStore, PoppedPart},
    },
    service::transport::TransportError,
};

// Types.

/// A transport failure pinned to the part that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartFailure {
    pub index: usize,
    pub total: usize,
    pub error: TransportError,
}

/// Result of handing one later part to the transport in scheduled mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledPart {
    pub index: usize,
    pub send_at: DateTime<Utc>,
    pub result: DeliveryResult,
}

/// What a session start did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Part 1 was sent; `pending` parts wait for continue requests.
    Started { message_id: MessageId, total: usize, pending: usize },
    /// Part 1 was sent; every later part was handed to the transport with a send time.
    Scheduled {
        message_id: MessageId,
        total: usize,
        scheduled: Vec<ScheduledPart>,
    },
    /// A session is still draining and the policy refuses to replace it.
    Rejected { pending: usize },
    /// Part 1 could not be sent; nothing was stored.
    Failed(PartFailure),
}

/// What a continue request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinueOutcome {
    /// The next part was sent.
    Delivered {
        message_id: MessageId,
        index: usize,
        total: usize,
        remaining: usize,
    },
    /// The recipient has nothing queued.
    NothingPending,
    /// The next part could not be sent and was put back at the front of the queue.
    Failed { failure: PartFailure, remaining: usize },
}

/// Controller knobs, usually taken from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Hard transport limit on a rendered part, in characters.
    pub max_message_length: usize,
    pub mode: DeliveryMode,
    pub policy: SessionPolicy,
    /// Keyword advertised in pull-mode hints.
    pub continue_keyword: String,
    /// Delay between session start and the second part in scheduled mode.
    pub scheduled_lead: Duration,
    /// Delay between consecutive later parts in scheduled mode.
    pub scheduled_spacing: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_message_length: config.max_message_length,
            mode: config.delivery_mode,
            policy: config.session_policy,
            continue_keyword: config.primary_continue_keyword().to_string(),
            scheduled_lead: config.scheduled_lead(),
            scheduled_spacing: config.scheduled_spacing(),
        }
    }
}

// Structs.

/// Orchestrates chunking, the pending store and the delivery driver.
///
/// This is trivially cloneable and can be shared across request handlers.
#[derive(Clone)]
pub struct SessionController {
    store: PendingStore,
    driver: DeliveryDriver,
    renderer: PartRenderer,
    settings: Arc<SessionSettings>,
}

impl SessionController {
    pub fn new(store: PendingStore, driver: DeliveryDriver, settings: SessionSettings) -> Self {
        let renderer = match settings.mode {
            DeliveryMode::Pull => PartRenderer::with_hint(&settings.continue_keyword),
            DeliveryMode::Scheduled => PartRenderer::plain(),
        };

        Self {
            store,
            driver,
            renderer,
            settings: Arc::new(settings),
        }
    }

    pub fn store(&self) -> &PendingStore {
        &self.store
    }

    pub fn driver(&self) -> &DeliveryDriver {
        &self.driver
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Splits `text` into rendered parts for this controller's mode.
    pub fn plan(&self, text: &str) -> Vec<MessagePart> {
        self.renderer.plan(text, self.settings.max_message_length)
    }

    /// Starts a delivery session for `text`.
    ///
    /// Part 1 always goes out immediately. If it fails, the session is abandoned and any
    /// earlier queue for the recipient is left untouched.
    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub async fn start_session(&self, recipient: &Recipient, text: &str) -> StartOutcome {
        if self.settings.policy == SessionPolicy::Reject {
            let pending = self.store.remaining(recipient).await;

            if pending > 0 {
                info!(pending, "Refusing a new session while one is draining.");
                return StartOutcome::Rejected { pending };
            }
        }

        let mut parts = VecDeque::from(self.plan(text));
        let first = parts.pop_front().unwrap_or_else(|| MessagePart {
            index: 1,
            total: 1,
            payload: String::new(),
        });
        let total = first.total;

        let message_id = match self.driver.deliver(recipient, &first.payload, None).await {
            Ok(id) => id,
            Err(error) => {
                warn!(%error, "First part failed; abandoning session.");
                return StartOutcome::Failed(PartFailure { index: 1, total, error });
            }
        };

        match self.settings.mode {
            DeliveryMode::Pull => {
                let pending = parts.len();

                // An empty remainder clears whatever an older session left behind.
                self.store.create_or_replace(recipient, parts.into()).await;

                info!(total, pending, "Session started.");

                StartOutcome::Started { message_id, total, pending }
            }
            DeliveryMode::Scheduled => {
                self.store.clear(recipient).await;

                let scheduled = self.schedule_rest(recipient, parts).await;
                let failed = scheduled.iter().filter(|p| p.result.is_err()).count();

                info!(total, failed, "Session scheduled.");

                StartOutcome::Scheduled { message_id, total, scheduled }
            }
        }
    }

    /// Hands every remaining part to the transport with spaced send times.
    ///
    /// Each part is its own delivery, so one failure does not stop the others.
    async fn schedule_rest(&self, recipient: &Recipient, parts: VecDeque<MessagePart>) -> Vec<ScheduledPart> {
        let now = Utc::now();
        let lead = TimeDelta::from_std(self.settings.scheduled_lead).unwrap_or_else(|_| TimeDelta::zero());
        let spacing = TimeDelta::from_std(self.settings.scheduled_spacing).unwrap_or_else(|_| TimeDelta::zero());

        let deliveries = parts.into_iter().enumerate().map(|(i, part)| {
            let send_at = now + lead + spacing * i32::try_from(i).unwrap_or(i32::MAX);

            async move {
                let result = self.driver.deliver(recipient, &part.payload, Some(send_at)).await;

                ScheduledPart {
                    index: part.index,
                    send_at,
                    result,
                }
            }
        });

        join_all(deliveries).await
    }

    /// Sends the recipient's next pending part.
    ///
    /// The store lock is held only for the pop; delivery happens outside it. A failed
    /// part is restored to the front of the queue so a later continue retries it.
    #[instrument(skip(self))]
    pub async fn continue_session(&self, recipient: &Recipient) -> ContinueOutcome {
        let Some(PoppedPart { part, remaining, session }) = self.store.pop_next(recipient).await else {
            info!("Nothing pending.");
            return ContinueOutcome::NothingPending;
        };

        match self.driver.deliver(recipient, &part.payload, None).await {
            Ok(message_id) => {
                info!(index = part.index, remaining, "Delivered pending part.");

                ContinueOutcome::Delivered {
                    message_id,
                    index: part.index,
                    total: part.total,
                    remaining,
                }
            }
            Err(error) => {
                warn!(index = part.index, %error, "Pending part failed; restoring it.");

                let failure = PartFailure {
                    index: part.index,
                    total: part.total,
                    error,
                };

                self.store.restore(recipient, session, part).await;
                let remaining = self.store.remaining(recipient).await;

                ContinueOutcome::Failed { failure, remaining }
            }
        }
    }

    /// Number of parts waiting for the recipient.
    pub async fn pending(&self, recipient: &Recipient) -> usize {
        self.store.remaining(recipient).await
    }
}
