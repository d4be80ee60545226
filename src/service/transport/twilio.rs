//! Twilio Messages API transport.
//!
//! Sends through `POST /2010-04-01/Accounts/{sid}/Messages.json`. Scheduled sends need a
//! messaging service, so a transport without one rejects every scheduled request.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::base::{
    config::Config,
    types::{MessageId, Recipient, Res},
};

use super::{GenericTransport, TransportClient, TransportError, TransportErrorKind};

// Extra methods on `TransportClient` applied by the twilio implementation.

impl TransportClient {
    /// Creates a new Twilio transport client.
    pub fn twilio(config: &Config) -> Res<Self> {
        let client = TwilioTransport::new(config)?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Structs.

/// Successful message creation response (only the fields we use).
#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
}

/// Twilio REST error body.
#[derive(Debug, Default, Deserialize)]
struct TwilioErrorBody {
    code: Option<i64>,
    message: Option<String>,
}

/// Twilio transport implementation.
#[derive(Clone)]
pub struct TwilioTransport {
    http: reqwest::Client,
    endpoint: String,
    account_sid: String,
    auth_token: String,
    address_prefix: String,
    from: String,
    messaging_service_sid: Option<String>,
}

impl TwilioTransport {
    /// Create a new Twilio transport.
    #[instrument(name = "TwilioTransport::new", skip_all)]
    pub fn new(config: &Config) -> Res<Self> {
        if config.twilio_account_sid.is_empty() || config.twilio_auth_token.is_empty() {
            return Err(anyhow::anyhow!("Twilio account sid and auth token are required."));
        }

        let from = Recipient::parse(&config.twilio_from_number)?;
        let endpoint = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            config.twilio_api_base.trim_end_matches('/'),
            config.twilio_account_sid
        );

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            address_prefix: config.address_prefix.clone(),
            from: format!("{}{}", config.address_prefix, from),
            messaging_service_sid: config.twilio_messaging_service_sid.clone().filter(|s| !s.is_empty()),
        })
    }

    /// Builds the form body for one message.
    fn form(&self, recipient: &Recipient, payload: &str, scheduled_at: Option<DateTime<Utc>>) -> Result<Vec<(&'static str, String)>, TransportError> {
        let mut form = vec![
            ("To", format!("{}{}", self.address_prefix, recipient)),
            ("From", self.from.clone()),
            ("Body", payload.to_string()),
        ];

        if let Some(at) = scheduled_at {
            let Some(service) = &self.messaging_service_sid else {
                return Err(TransportError::new(
                    TransportErrorKind::SchedulingRejected,
                    "scheduling_unavailable",
                    "Scheduled delivery requires a messaging service sid.",
                ));
            };

            form.push(("MessagingServiceSid", service.clone()));
            form.push(("ScheduleType", "fixed".to_string()));
            form.push(("SendAt", send_at_text(at)));
        }

        Ok(form)
    }
}

#[async_trait]
impl GenericTransport for TwilioTransport {
    #[instrument(skip(self, payload))]
    async fn send(&self, recipient: &Recipient, payload: &str, scheduled_at: Option<DateTime<Utc>>) -> Result<MessageId, TransportError> {
        let form = self.form(recipient, payload, scheduled_at)?;

        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(TransportError::network)?;

        let status = response.status();

        if status.is_success() {
            let message: TwilioMessage = response
                .json()
                .await
                .map_err(|e| TransportError::new(TransportErrorKind::Rejected, "malformed_response", e.to_string()))?;

            debug!(sid = %message.sid, "Twilio accepted message.");

            return Ok(MessageId(message.sid));
        }

        let body = response.text().await.unwrap_or_default();
        let error: TwilioErrorBody = serde_json::from_str(&body).unwrap_or_default();

        let kind = classify(status.as_u16(), error.code);
        let code = error.code.map(|c| c.to_string()).unwrap_or_else(|| status.as_u16().to_string());
        let message = error.message.unwrap_or_else(|| format!("Twilio responded with status {status}."));

        Err(TransportError::new(kind, code, message))
    }
}

/// Formats a send time to whole seconds, rounding up so the lead never shrinks.
fn send_at_text(at: DateTime<Utc>) -> String {
    let secs = at.timestamp() + i64::from(at.timestamp_subsec_nanos() > 0);
    let rounded = DateTime::from_timestamp(secs, 0).unwrap_or(at);

    rounded.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Maps an HTTP status and Twilio error code to an error kind.
fn classify(status: u16, code: Option<i64>) -> TransportErrorKind {
    match (status, code) {
        (_, Some(20429)) | (429, _) => TransportErrorKind::RateLimited,
        (_, Some(21211 | 21610 | 21614 | 63003)) => TransportErrorKind::InvalidRecipient,
        (_, Some(21617)) => TransportErrorKind::PayloadTooLarge,
        (_, Some(c)) if (35100..35200).contains(&c) => TransportErrorKind::SchedulingRejected,
        _ => TransportErrorKind::Rejected,
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::config::ConfigInner;

    fn config(messaging_service_sid: Option<&str>) -> Config {
        Config::from(ConfigInner {
            twilio_account_sid: "AC123".to_string(),
            twilio_auth_token: "secret".to_string(),
            twilio_from_number: "+15550000000".to_string(),
            twilio_messaging_service_sid: messaging_service_sid.map(str::to_string),
            ..Default::default()
        })
    }

    fn lookup<'a>(form: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn classifies_twilio_codes() {
        assert_eq!(classify(429, None), TransportErrorKind::RateLimited);
        assert_eq!(classify(400, Some(20429)), TransportErrorKind::RateLimited);
        assert_eq!(classify(400, Some(21211)), TransportErrorKind::InvalidRecipient);
        assert_eq!(classify(400, Some(21617)), TransportErrorKind::PayloadTooLarge);
        assert_eq!(classify(400, Some(35114)), TransportErrorKind::SchedulingRejected);
        assert_eq!(classify(500, None), TransportErrorKind::Rejected);
    }

    #[test]
    fn immediate_form_prefixes_addresses() {
        let transport = TwilioTransport::new(&config(None)).unwrap();
        let recipient = Recipient::parse("+15551112222").unwrap();

        let form = transport.form(&recipient, "hello", None).unwrap();

        assert_eq!(lookup(&form, "To"), Some("whatsapp:+15551112222"));
        assert_eq!(lookup(&form, "From"), Some("whatsapp:+15550000000"));
        assert_eq!(lookup(&form, "Body"), Some("hello"));
        assert_eq!(lookup(&form, "SendAt"), None);
    }

    #[test]
    fn scheduled_form_needs_a_messaging_service() {
        let recipient = Recipient::parse("+15551112222").unwrap();
        let at = DateTime::parse_from_rfc3339("2030-01-01T12:00:00Z").unwrap().with_timezone(&Utc);

        let without = TwilioTransport::new(&config(None)).unwrap();
        let err = without.form(&recipient, "hello", Some(at)).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::SchedulingRejected);

        let with = TwilioTransport::new(&config(Some("MG123"))).unwrap();
        let form = with.form(&recipient, "hello", Some(at)).unwrap();
        assert_eq!(lookup(&form, "MessagingServiceSid"), Some("MG123"));
        assert_eq!(lookup(&form, "ScheduleType"), Some("fixed"));
        assert_eq!(lookup(&form, "SendAt"), Some("2030-01-01T12:00:00Z"));
    }

    #[test]
    fn send_at_rounds_partial_seconds_up() {
        let exact = DateTime::parse_from_rfc3339("2030-01-01T12:00:00Z").unwrap().with_timezone(&Utc);
        let partial = DateTime::parse_from_rfc3339("2030-01-01T12:00:00.250Z").unwrap().with_timezone(&Utc);

        assert_eq!(send_at_text(exact), "2030-01-01T12:00:00Z");
        assert_eq!(send_at_text(partial), "2030-01-01T12:00:01Z");
    }

    #[test]
    fn endpoint_includes_account_sid() {
        let transport = TwilioTransport::new(&config(None)).unwrap();
        assert_eq!(transport.endpoint, "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json");
    }
}
