//! Chat transport boundary.
//!
//! The engine never talks to a chat platform directly. Everything it needs
//! (send, edit, delete, react) goes through the [`Transport`] trait, and
//! everything it reacts to arrives as an [`IncomingEvent`].
//!
//! ```text
//!  Engine ── send / edit / delete / react ──► Transport ──► chat platform
//!         ◄──────────── EventStream ─────────────┘
//! ```

mod console;
mod memory;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::engine::RenderResult;
use crate::error::TransportError;

pub use console::{ConsoleInput, ConsoleTransport, parse_console_line};
pub use memory::{MemoryTransport, Op, TransportCall};

/// Platform identifier of a posted message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Handle to a message the bot has posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: MessageId,
    pub channel_id: String,
    /// Whether the platform still accepts in-place edits of this message.
    pub editable: bool,
    pub sent_at: DateTime<Utc>,
}

/// A reaction added to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub message_id: MessageId,
    pub channel_id: String,
    pub user_id: String,
    pub emoji: String,
    /// Set when the reaction was added by the bot itself.
    pub from_self: bool,
}

/// A text message posted by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingReply {
    pub message_id: MessageId,
    pub channel_id: String,
    pub user_id: String,
    pub content: String,
}

/// Events delivered by the transport to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingEvent {
    ReactionAdded(ReactionEvent),
    TextReply(IncomingReply),
}

/// Stream of incoming events.
pub type EventStream = Pin<Box<dyn Stream<Item = IncomingEvent> + Send>>;

/// Operations the engine consumes from a chat platform.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name, used in logs.
    fn name(&self) -> &str;

    /// Post a new message to a channel.
    async fn send_message(
        &self,
        channel_id: &str,
        content: &RenderResult,
    ) -> Result<SentMessage, TransportError>;

    /// Edit a posted message in place.
    ///
    /// The returned handle may carry a different id than `message` when the
    /// platform had to replace the message.
    async fn edit_message(
        &self,
        message: &SentMessage,
        content: &RenderResult,
    ) -> Result<SentMessage, TransportError>;

    /// Delete a message.
    async fn delete_message(&self, channel_id: &str, id: &MessageId)
    -> Result<(), TransportError>;

    /// Attach a reaction marker to a posted message.
    async fn add_reaction(&self, message: &SentMessage, emoji: &str)
    -> Result<(), TransportError>;
}
