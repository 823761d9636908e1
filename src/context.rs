//! Conversation context shared by interactive messages.
//!
//! A context is the channel an interactive message lives in, plus the user
//! who opened it and the transport used to reach it. Messages retain the
//! context for their whole lifetime and release it exactly once when they are
//! destroyed; the holder count lets callers see whether anything still
//! renders into a conversation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::engine::RenderResult;
use crate::error::TransportError;
use crate::transport::{MessageId, SentMessage, Transport};

pub struct ConversationContext {
    channel_id: String,
    user_id: String,
    transport: Arc<dyn Transport>,
    holders: AtomicUsize,
}

impl ConversationContext {
    pub fn new(
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        Arc::new(Self {
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            transport,
            holders: AtomicUsize::new(0),
        })
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// The user who opened the conversation.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Number of interactive messages currently holding this context.
    pub fn holders(&self) -> usize {
        self.holders.load(Ordering::SeqCst)
    }

    pub(crate) fn retain(&self) {
        self.holders.fetch_add(1, Ordering::SeqCst);
    }

    /// Drop one hold. Never goes below zero.
    pub(crate) fn release(&self) {
        let _ = self
            .holders
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Post a message into this conversation.
    pub async fn send(&self, content: &RenderResult) -> Result<SentMessage, TransportError> {
        self.transport.send_message(&self.channel_id, content).await
    }

    /// Delete a message in this conversation, logging instead of failing.
    pub async fn delete_quietly(&self, id: &MessageId) {
        if let Err(e) = self.transport.delete_message(&self.channel_id, id).await {
            tracing::warn!(
                channel = %self.channel_id,
                message = %id,
                "Failed to delete message: {}",
                e
            );
        }
    }
}

impl fmt::Debug for ConversationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationContext")
            .field("channel_id", &self.channel_id)
            .field("user_id", &self.user_id)
            .field("transport", &self.transport.name())
            .field("holders", &self.holders())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    #[test]
    fn test_retain_release() {
        let ctx = ConversationContext::new("c1", "u1", Arc::new(MemoryTransport::new()));
        assert_eq!(ctx.holders(), 0);

        ctx.retain();
        ctx.retain();
        assert_eq!(ctx.holders(), 2);

        ctx.release();
        ctx.release();
        assert_eq!(ctx.holders(), 0);

        // Extra releases are ignored
        ctx.release();
        assert_eq!(ctx.holders(), 0);
    }

    #[tokio::test]
    async fn test_delete_quietly_swallows_errors() {
        let transport = Arc::new(MemoryTransport::new());
        let ctx = ConversationContext::new("c1", "u1", transport.clone());
        ctx.delete_quietly(&MessageId::from("missing")).await;
        assert_eq!(transport.deletes(), 1);
    }
}
