use std::fmt;

use serde::{Deserialize, Serialize};

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// Address prefix the WhatsApp transport puts in front of phone numbers.
pub const WHATSAPP_PREFIX: &str = "whatsapp:";

/// A normalized messaging endpoint.
///
/// The only way to build one is through [`Recipient::parse`], so every store key and
/// every lookup share the same canonical form: `whatsapp:+15551234567`,
/// `+1 (555) 123-4567` and `15551234567` all map to `+15551234567`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Recipient(String);

impl Recipient {
    /// Normalizes a raw address into a recipient.
    pub fn parse(raw: &str) -> Res<Self> {
        let trimmed = raw.trim();

        let unprefixed = match trimmed.get(..WHATSAPP_PREFIX.len()) {
            Some(head) if head.eq_ignore_ascii_case(WHATSAPP_PREFIX) => &trimmed[WHATSAPP_PREFIX.len()..],
            _ => trimmed,
        };

        let unprefixed = unprefixed.trim();
        if unprefixed.is_empty() {
            return Err(anyhow::anyhow!("Recipient address is empty: `{raw}`."));
        }

        // Phone-like addresses lose their formatting; anything else stays opaque.
        let compact: String = unprefixed.chars().filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')')).collect();
        let digits = compact.strip_prefix('+').unwrap_or(&compact);

        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Self(format!("+{digits}")));
        }

        Ok(Self(unprefixed.to_string()))
    }

    /// The canonical form, without any transport prefix.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Recipient {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Recipient::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Transport-assigned message identifier (a Twilio `SM...` sid).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One rendered, transport-sized fragment of a longer message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessagePart {
    /// 1-based position of the part.
    pub index: usize,
    /// Total number of parts in the split.
    pub total: usize,
    /// Final text handed to the transport (header and hint included).
    pub payload: String,
}

/// How the parts after the first one reach the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Parts wait in the pending store until the recipient asks for the next one.
    #[default]
    Pull,
    /// Every part is handed to the transport at once with spaced send times.
    Scheduled,
}

/// What happens when a new session starts while an older one is still draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// The new session discards the old queue.
    #[default]
    Replace,
    /// The new session is refused until the old queue is drained.
    Reject,
}

/// Which text-generation backend produces replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    #[default]
    Deepai,
    Openai,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_and_bare_numbers_share_a_key() {
        let a = Recipient::parse("whatsapp:+15551234567").unwrap();
        let b = Recipient::parse("+15551234567").unwrap();
        let c = Recipient::parse("  WhatsApp:15551234567 ").unwrap();
        let d = Recipient::parse("+1 (555) 123-4567").unwrap();

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(c, d);
        assert_eq!(a.as_str(), "+15551234567");
    }

    #[test]
    fn non_phone_addresses_stay_opaque() {
        let r = Recipient::parse("whatsapp:user-handle").unwrap();
        assert_eq!(r.as_str(), "user-handle");
    }

    #[test]
    fn empty_addresses_are_rejected() {
        assert!(Recipient::parse("").is_err());
        assert!(Recipient::parse("whatsapp:").is_err());
        assert!(Recipient::parse("   ").is_err());
    }

    #[test]
    fn recipient_deserializes_normalized() {
        let r: Recipient = serde_json::from_str("\"whatsapp:+44 20 7946 0000\"").unwrap();
        assert_eq!(r.as_str(), "+442079460000");
    }
}
