//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc, time::Duration};

use serde::Deserialize;

use crate::{
    base::{
        prompts,
        types::{DeliveryMode, GeneratorKind, SessionPolicy, Void},
    },
    delivery::render::PartRenderer,
};

use super::types::Res;

/// Largest part count the configured message length must leave header room for.
const MAX_PLANNED_PARTS: usize = 999;

/// Minimum number of payload characters left per part after the header margin.
const MIN_PAYLOAD_CHARS: usize = 16;

/// Upper bound for scheduled lead and spacing (Twilio schedules at most 35 days ahead).
const MAX_SCHEDULE_SECS: u64 = 35 * 24 * 60 * 60;

/// Twilio refuses scheduled sends less than 15 minutes ahead of the request.
pub const MIN_SCHEDULE_SECS: u64 = 15 * 60;

/// Default Twilio REST API base URL.
fn default_twilio_api_base() -> String {
    "https://api.twilio.com".to_string()
}

/// Default transport address prefix.
fn default_address_prefix() -> String {
    crate::base::types::WHATSAPP_PREFIX.to_string()
}

/// Default DeepAI text generator endpoint.
fn default_deepai_endpoint() -> String {
    "https://api.deepai.org/api/text-generator".to_string()
}

/// Default OpenAI model to use.
fn default_openai_model() -> String {
    "gpt-4.1-mini".to_string()
}

/// Default max output tokens for the OpenAI model.
fn default_openai_max_tokens() -> u32 {
    1024
}

/// Default system directive for chat-style generators.
fn default_generation_directive() -> String {
    prompts::GENERATION_DIRECTIVE.to_string()
}

/// Default generation timeout, in seconds.
fn default_generation_timeout_secs() -> u64 {
    60
}

/// Default keyword that marks a message as a generation request.
fn default_trigger_keyword() -> String {
    "caption".to_string()
}

/// Default keywords that ask for the next pending part.
fn default_continue_keywords() -> Vec<String> {
    vec!["continue".to_string(), "next".to_string()]
}

/// Default prefix in front of generated replies.
fn default_response_prefix() -> String {
    prompts::RESPONSE_PREFIX.to_string()
}

/// Default fallback reply.
fn default_fallback_message() -> String {
    prompts::FALLBACK_MESSAGE.to_string()
}

/// Default help reply.
fn default_help_message() -> String {
    prompts::HELP_MESSAGE.to_string()
}

/// Default hard per-message limit (Twilio WhatsApp bodies cap at 1600 characters).
fn default_max_message_length() -> usize {
    1600
}

/// Default per-delivery timeout, in seconds.
fn default_delivery_timeout_secs() -> u64 {
    15
}

/// Default lead before the first scheduled part; the 15-minute minimum plus one delivery timeout and slack.
fn default_scheduled_lead_secs() -> u64 {
    960
}

/// Default spacing between scheduled parts, in seconds.
fn default_scheduled_spacing_secs() -> u64 {
    60
}

/// Default webhook listen address.
fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

/// Configuration for the relay-bot application.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Twilio account sid (`TWILIO_ACCOUNT_SID`).
    pub twilio_account_sid: String,
    /// Twilio auth token (`TWILIO_AUTH_TOKEN`).
    pub twilio_auth_token: String,
    /// Sender number, without the address prefix (`TWILIO_FROM_NUMBER`).
    pub twilio_from_number: String,
    /// Messaging service sid; required for scheduled sends (`TWILIO_MESSAGING_SERVICE_SID`).
    #[serde(default)]
    pub twilio_messaging_service_sid: Option<String>,
    /// Twilio REST API base URL (`TWILIO_API_BASE`).
    #[serde(default = "default_twilio_api_base")]
    pub twilio_api_base: String,
    /// Prefix the transport expects in front of addresses (`ADDRESS_PREFIX`).
    #[serde(default = "default_address_prefix")]
    pub address_prefix: String,
    /// Text-generation backend (`GENERATOR`): `deepai` or `openai`.
    #[serde(default)]
    pub generator: GeneratorKind,
    /// DeepAI API key (`DEEPAI_API_KEY`).
    #[serde(default)]
    pub deepai_api_key: String,
    /// DeepAI text generator endpoint (`DEEPAI_ENDPOINT`).
    #[serde(default = "default_deepai_endpoint")]
    pub deepai_endpoint: String,
    /// OpenAI API key (`OPENAI_API_KEY`).
    #[serde(default)]
    pub openai_api_key: String,
    /// OpenAI model to use (`OPENAI_MODEL`).
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// Max output tokens for the OpenAI model (`OPENAI_MAX_TOKENS`).
    #[serde(default = "default_openai_max_tokens")]
    pub openai_max_tokens: u32,
    /// System directive for chat-style generators (`GENERATION_DIRECTIVE`).
    #[serde(default = "default_generation_directive")]
    pub generation_directive: String,
    /// Timeout for one generation call, in seconds (`GENERATION_TIMEOUT_SECS`).
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
    /// Keyword a message must contain to trigger generation; empty accepts every message (`TRIGGER_KEYWORD`).
    #[serde(default = "default_trigger_keyword")]
    pub trigger_keyword: String,
    /// Whole-message keywords that ask for the next pending part (file only).
    #[serde(default = "default_continue_keywords")]
    pub continue_keywords: Vec<String>,
    /// Prefix in front of every generated reply (`RESPONSE_PREFIX`).
    #[serde(default = "default_response_prefix")]
    pub response_prefix: String,
    /// Reply used when generation fails (`FALLBACK_MESSAGE`).
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
    /// Reply sent when the trigger keyword is missing (`HELP_MESSAGE`).
    #[serde(default = "default_help_message")]
    pub help_message: String,
    /// Hard per-message character limit of the transport (`MAX_MESSAGE_LENGTH`).
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// `pull` or `scheduled` (`DELIVERY_MODE`).
    #[serde(default)]
    pub delivery_mode: DeliveryMode,
    /// `replace` or `reject` (`SESSION_POLICY`).
    #[serde(default)]
    pub session_policy: SessionPolicy,
    /// Timeout for one transport call, in seconds (`DELIVERY_TIMEOUT_SECS`).
    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,
    /// Delay before the second part in scheduled mode, in seconds (`SCHEDULED_LEAD_SECS`).
    #[serde(default = "default_scheduled_lead_secs")]
    pub scheduled_lead_secs: u64,
    /// Spacing between scheduled parts, in seconds (`SCHEDULED_SPACING_SECS`).
    #[serde(default = "default_scheduled_spacing_secs")]
    pub scheduled_spacing_secs: u64,
    /// Address the webhook server binds to (`LISTEN_ADDR`).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_from_number: String::new(),
            twilio_messaging_service_sid: None,
            twilio_api_base: default_twilio_api_base(),
            address_prefix: default_address_prefix(),
            generator: GeneratorKind::default(),
            deepai_api_key: String::new(),
            deepai_endpoint: default_deepai_endpoint(),
            openai_api_key: String::new(),
            openai_model: default_openai_model(),
            openai_max_tokens: default_openai_max_tokens(),
            generation_directive: default_generation_directive(),
            generation_timeout_secs: default_generation_timeout_secs(),
            trigger_keyword: default_trigger_keyword(),
            continue_keywords: default_continue_keywords(),
            response_prefix: default_response_prefix(),
            fallback_message: default_fallback_message(),
            help_message: default_help_message(),
            max_message_length: default_max_message_length(),
            delivery_mode: DeliveryMode::default(),
            session_policy: SessionPolicy::default(),
            delivery_timeout_secs: default_delivery_timeout_secs(),
            scheduled_lead_secs: default_scheduled_lead_secs(),
            scheduled_spacing_secs: default_scheduled_spacing_secs(),
            listen_addr: default_listen_addr(),
        }
    }
}

impl ConfigInner {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn scheduled_lead(&self) -> Duration {
        Duration::from_secs(self.scheduled_lead_secs)
    }

    pub fn scheduled_spacing(&self) -> Duration {
        Duration::from_secs(self.scheduled_spacing_secs)
    }

    /// The keyword advertised in the "reply for more" hint.
    pub fn primary_continue_keyword(&self) -> &str {
        self.continue_keywords.iter().map(|k| k.trim()).find(|k| !k.is_empty()).unwrap_or("next")
    }
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("RELAY_BOT"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Checks the cross-field constraints the deserializer cannot express.
    pub fn validate(&self) -> Void {
        if self.continue_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(anyhow::anyhow!("At least one continue keyword is required."));
        }

        let margin = PartRenderer::with_hint(self.primary_continue_keyword()).reserve(MAX_PLANNED_PARTS);
        if self.max_message_length < margin + MIN_PAYLOAD_CHARS {
            return Err(anyhow::anyhow!(
                "Max message length must be at least {} characters to fit part headers.",
                margin + MIN_PAYLOAD_CHARS
            ));
        }

        if self.delivery_timeout_secs < 1 || self.generation_timeout_secs < 1 {
            return Err(anyhow::anyhow!("Delivery and generation timeouts must be at least 1 second."));
        }

        if self.scheduled_lead_secs > MAX_SCHEDULE_SECS || self.scheduled_spacing_secs > MAX_SCHEDULE_SECS {
            return Err(anyhow::anyhow!("Scheduled lead and spacing must not exceed {MAX_SCHEDULE_SECS} seconds."));
        }

        // Send times are fixed before the request goes out, so a slow transport eats into the lead.
        let min_lead = MIN_SCHEDULE_SECS + self.delivery_timeout_secs;
        if self.delivery_mode == DeliveryMode::Scheduled && self.scheduled_lead_secs < min_lead {
            return Err(anyhow::anyhow!("Scheduled lead must be at least {min_lead} seconds (15 minutes plus the delivery timeout)."));
        }

        match self.generator {
            GeneratorKind::Deepai if self.deepai_api_key.is_empty() => Err(anyhow::anyhow!("DeepAI generator selected, but no DeepAI API key is set.")),
            GeneratorKind::Openai if self.openai_api_key.is_empty() => Err(anyhow::anyhow!("OpenAI generator selected, but no OpenAI API key is set.")),
            _ => Ok(()),
        }
    }
}
