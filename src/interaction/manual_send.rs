//! Administrative "send this text now" path.
//!
//! Long messages are split with the same planner as sessions (headers, no hints) and
//! every part is delivered immediately, in order. Nothing touches the pending store.

use crate::{
    delivery::{
        render::PartRenderer,
        session::{PartFailure, SessionController},
    },
    prelude::*,
};

/// The first failed part of a manual send, plus what went out before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualSendFailure {
    pub failure: PartFailure,
    pub delivered: Vec<MessageId>,
}

/// Delivers `message` to `recipient`, stopping at the first transport error.
#[instrument(skip(sessions, message), fields(chars = message.chars().count()))]
pub async fn send_all(sessions: &SessionController, recipient: &Recipient, message: &str) -> Result<Vec<MessageId>, ManualSendFailure> {
    let parts = PartRenderer::plain().plan(message, sessions.settings().max_message_length);
    let mut delivered = Vec::with_capacity(parts.len());

    for part in parts {
        match sessions.driver().deliver(recipient, &part.payload, None).await {
            Ok(id) => delivered.push(id),
            Err(error) => {
                warn!(index = part.index, %error, "Manual send stopped.");

                return Err(ManualSendFailure {
                    failure: PartFailure {
                        index: part.index,
                        total: part.total,
                        error,
                    },
                    delivered,
                });
            }
        }
    }

    info!(parts = delivered.len(), "Manual send complete.");

    Ok(delivered)
}
