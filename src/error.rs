//! Error types for livemsg.

use crate::transport::MessageId;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Errors reported by a chat transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to send message to channel {channel}: {reason}")]
    SendFailed { channel: String, reason: String },

    #[error("Failed to edit message {id}: {reason}")]
    EditFailed { id: MessageId, reason: String },

    #[error("Failed to delete message {id}: {reason}")]
    DeleteFailed { id: MessageId, reason: String },

    #[error("Failed to add reaction {emoji} to message {id}: {reason}")]
    ReactionFailed {
        id: MessageId,
        emoji: String,
        reason: String,
    },

    #[error("Unknown message {id}")]
    UnknownMessage { id: MessageId },
}

/// Errors surfaced by the interactive message engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Trigger {name} failed: {reason}")]
    Trigger { name: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
