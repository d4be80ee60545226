pub use crate::base::{
    config::Config,
    types::{MessageId, MessagePart, Recipient, Res, Void},
};
pub use anyhow::anyhow;
pub use tracing::{debug, error, info, instrument, warn};
