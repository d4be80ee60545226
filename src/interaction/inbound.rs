//! Handling of inbound WhatsApp messages.
//!
//! A message is either a request for the next pending part, a generation request
//! (it contains the trigger keyword), or anything else, which gets the help reply.

use tracing::{Instrument, error, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{Recipient, Res},
    },
    delivery::{
        driver::DeliveryResult,
        session::{ContinueOutcome, SessionController, StartOutcome},
    },
    service::llm::LlmClient,
};

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Generate a reply for `prompt` and start a session with it.
    Fresh { recipient: Recipient, prompt: String },
    /// Send the recipient's next pending part.
    Continue { recipient: Recipient },
    /// The message was not a request; answer with the help text.
    Help { recipient: Recipient },
}

impl InboundEvent {
    /// Classifies a raw webhook message from `from` with text `body`.
    pub fn classify(from: &str, body: &str, config: &Config) -> Res<Self> {
        let recipient = Recipient::parse(from)?;
        let trimmed = body.trim();

        if config.continue_keywords.iter().any(|k| !k.trim().is_empty() && k.trim().eq_ignore_ascii_case(trimmed)) {
            return Ok(Self::Continue { recipient });
        }

        let keyword = config.trigger_keyword.trim();

        let prompt = if keyword.is_empty() {
            normalize_whitespace(trimmed)
        } else if trimmed.to_ascii_lowercase().contains(&keyword.to_ascii_lowercase()) {
            strip_keyword(trimmed, keyword)
        } else {
            return Ok(Self::Help { recipient });
        };

        if prompt.is_empty() {
            return Ok(Self::Help { recipient });
        }

        Ok(Self::Fresh { recipient, prompt })
    }

    pub fn recipient(&self) -> &Recipient {
        match self {
            Self::Fresh { recipient, .. } | Self::Continue { recipient } | Self::Help { recipient } => recipient,
        }
    }
}

/// What processing an inbound event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    Started(StartOutcome),
    Continued(ContinueOutcome),
    Helped(DeliveryResult),
}

/// Processes `event` on a background task, logging the outcome.
#[instrument(skip_all)]
pub fn handle_inbound(event: InboundEvent, config: Config, llm: LlmClient, sessions: SessionController) {
    tokio::spawn(
        async move {
            let outcome = process_inbound(event, &config, &llm, &sessions).await;
            log_outcome(&outcome);
        }
        .in_current_span(),
    );
}

/// Processes `event` to completion.
#[instrument(skip_all, fields(recipient = %event.recipient()))]
pub async fn process_inbound(event: InboundEvent, config: &Config, llm: &LlmClient, sessions: &SessionController) -> InboundOutcome {
    match event {
        InboundEvent::Continue { recipient } => InboundOutcome::Continued(sessions.continue_session(&recipient).await),
        InboundEvent::Help { recipient } => InboundOutcome::Helped(sessions.driver().deliver(&recipient, &config.help_message, None).await),
        InboundEvent::Fresh { recipient, prompt } => {
            let reply = generate_reply(config, llm, &prompt).await;
            InboundOutcome::Started(sessions.start_session(&recipient, &reply).await)
        }
    }
}

/// Asks the generator for a reply, substituting the fallback on failure or empty output.
#[instrument(skip_all)]
pub async fn generate_reply(config: &Config, llm: &LlmClient, prompt: &str) -> String {
    match llm.generate(prompt).await {
        Ok(text) if !text.trim().is_empty() => format!("{}{}", config.response_prefix, text.trim()),
        Ok(_) => {
            warn!("Generator returned no text; using the fallback reply.");
            config.fallback_message.clone()
        }
        Err(err) => {
            warn!("Generation failed; using the fallback reply: {err}");
            config.fallback_message.clone()
        }
    }
}

fn log_outcome(outcome: &InboundOutcome) {
    match outcome {
        InboundOutcome::Started(StartOutcome::Failed(failure)) => error!(index = failure.index, "Session failed to start: {}", failure.error),
        InboundOutcome::Started(StartOutcome::Rejected { pending }) => warn!(pending, "Session rejected while another is draining."),
        InboundOutcome::Started(_) => info!("Session started."),
        InboundOutcome::Continued(ContinueOutcome::Failed { failure, remaining }) => {
            error!(index = failure.index, remaining, "Continue failed: {}", failure.error)
        }
        InboundOutcome::Continued(_) => info!("Continue handled."),
        InboundOutcome::Helped(Err(err)) => error!("Help reply failed: {err}"),
        InboundOutcome::Helped(Ok(_)) => info!("Help reply sent."),
    }
}

/// Removes every ASCII-case-insensitive occurrence of `keyword` and tidies whitespace.
fn strip_keyword(text: &str, keyword: &str) -> String {
    let lower = text.to_ascii_lowercase();
    let needle = keyword.to_ascii_lowercase();

    let mut kept = String::with_capacity(text.len());
    let mut last = 0;

    for (start, _) in lower.match_indices(&needle) {
        kept.push_str(&text[last..start]);
        kept.push(' ');
        last = start + needle.len();
    }

    kept.push_str(&text[last..]);

    normalize_whitespace(&kept)
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
