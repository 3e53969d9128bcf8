//! Transport abstraction: inbound messages, the bot handle, and channels.

pub mod cli;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

pub use cli::CliChannel;

/// A message as the transport delivered it.
///
/// Serialized whole into the NLU request context, so transport-specific
/// extras belong in `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender identifier.
    pub user: String,
    /// Message text. `None` for non-text events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Channel identifier on channel-oriented transports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl InboundMessage {
    pub fn new(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            text: Some(text.into()),
            channel: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// A message carrying no text.
    pub fn without_text(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            text: None,
            channel: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Handle to the transport a message arrived on.
///
/// Passed untouched to listeners. The bridge itself reads only `identity()`.
#[async_trait]
pub trait BotHandle: Send + Sync {
    /// Transport name for logs.
    fn name(&self) -> &str;

    /// The bot's own user id. `Some` marks a channel-oriented transport.
    fn identity(&self) -> Option<&str> {
        None
    }

    /// Reply to `message` on the same conversation.
    async fn reply(&self, message: &InboundMessage, text: &str) -> Result<(), ChannelError>;
}

/// Stream of inbound messages from a channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// A transport the bridge can listen on.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start receiving. The stream ends when the transport closes.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Handle passed to every turn started from this channel.
    fn handle(&self) -> Arc<dyn BotHandle>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
