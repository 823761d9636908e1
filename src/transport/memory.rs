//! In-memory transport that records every call.
//!
//! Used by tests to observe what the engine sends to the platform, and to
//! inject failures and latency.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::engine::RenderResult;
use crate::error::TransportError;
use crate::transport::{MessageId, SentMessage, Transport};

/// A transport call as observed by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Send {
        channel_id: String,
        content: RenderResult,
    },
    Edit {
        id: MessageId,
        content: RenderResult,
    },
    Delete {
        id: MessageId,
    },
    React {
        id: MessageId,
        emoji: String,
    },
}

/// Operation kinds that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Send,
    Edit,
    Delete,
    React,
}

/// Transport backed by a map of posted messages.
pub struct MemoryTransport {
    next_id: AtomicU64,
    messages: Mutex<HashMap<MessageId, RenderResult>>,
    calls: Mutex<Vec<TransportCall>>,
    failing: Mutex<HashSet<Op>>,
    latency: Mutex<Option<Duration>>,
    /// New messages are posted as non-editable.
    frozen: AtomicBool,
    /// Edits replace the message with a new id.
    replace_on_edit: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            messages: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            latency: Mutex::new(None),
            frozen: AtomicBool::new(false),
            replace_on_edit: AtomicBool::new(false),
        }
    }

    /// Make every call of `op` fail (or succeed again).
    pub fn set_failing(&self, op: Op, failing: bool) {
        let mut set = lock(&self.failing);
        if failing {
            set.insert(op);
        } else {
            set.remove(&op);
        }
    }

    /// Delay every call by `latency` before it takes effect.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    /// Post subsequent messages as non-editable.
    pub fn set_frozen(&self, frozen: bool) {
        self.frozen.store(frozen, Ordering::SeqCst);
    }

    /// Make edits hand back a new message id.
    pub fn set_replace_on_edit(&self, replace: bool) {
        self.replace_on_edit.store(replace, Ordering::SeqCst);
    }

    /// All calls observed so far, in order.
    pub fn calls(&self) -> Vec<TransportCall> {
        lock(&self.calls).clone()
    }

    pub fn sends(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Send { .. }))
    }

    pub fn edits(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Edit { .. }))
    }

    pub fn deletes(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Delete { .. }))
    }

    pub fn reactions_on(&self, id: &MessageId) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                TransportCall::React { id: rid, emoji } if rid == id => Some(emoji.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self, id: &MessageId) -> bool {
        lock(&self.calls)
            .iter()
            .any(|c| matches!(c, TransportCall::Delete { id: did } if did == id))
    }

    /// Current content of a live message.
    pub fn content_of(&self, id: &MessageId) -> Option<RenderResult> {
        lock(&self.messages).get(id).cloned()
    }

    /// Number of messages currently posted.
    pub fn live_messages(&self) -> usize {
        lock(&self.messages).len()
    }

    /// Simulate a user posting a message, so that it can later be deleted.
    pub fn post_user_message(&self, text: &str) -> MessageId {
        let id = self.allocate_id("u");
        lock(&self.messages).insert(id.clone(), RenderResult::text(text));
        id
    }

    fn count(&self, pred: impl Fn(&TransportCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| pred(c)).count()
    }

    fn allocate_id(&self, prefix: &str) -> MessageId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        MessageId(format!("{}{}", prefix, n))
    }

    fn is_failing(&self, op: Op) -> bool {
        lock(&self.failing).contains(&op)
    }

    async fn record(&self, call: TransportCall) {
        lock(&self.calls).push(call);
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send_message(
        &self,
        channel_id: &str,
        content: &RenderResult,
    ) -> Result<SentMessage, TransportError> {
        self.record(TransportCall::Send {
            channel_id: channel_id.to_string(),
            content: content.clone(),
        })
        .await;
        if self.is_failing(Op::Send) {
            return Err(TransportError::SendFailed {
                channel: channel_id.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        let id = self.allocate_id("m");
        lock(&self.messages).insert(id.clone(), content.clone());
        Ok(SentMessage {
            id,
            channel_id: channel_id.to_string(),
            editable: !self.frozen.load(Ordering::SeqCst),
            sent_at: Utc::now(),
        })
    }

    async fn edit_message(
        &self,
        message: &SentMessage,
        content: &RenderResult,
    ) -> Result<SentMessage, TransportError> {
        self.record(TransportCall::Edit {
            id: message.id.clone(),
            content: content.clone(),
        })
        .await;
        if self.is_failing(Op::Edit) {
            return Err(TransportError::EditFailed {
                id: message.id.clone(),
                reason: "injected failure".to_string(),
            });
        }
        let mut messages = lock(&self.messages);
        if !messages.contains_key(&message.id) {
            return Err(TransportError::UnknownMessage {
                id: message.id.clone(),
            });
        }
        if self.replace_on_edit.load(Ordering::SeqCst) {
            messages.remove(&message.id);
            drop(messages);
            let id = self.allocate_id("m");
            lock(&self.messages).insert(id.clone(), content.clone());
            return Ok(SentMessage {
                id,
                sent_at: Utc::now(),
                ..message.clone()
            });
        }
        messages.insert(message.id.clone(), content.clone());
        Ok(message.clone())
    }

    async fn delete_message(
        &self,
        _channel_id: &str,
        id: &MessageId,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::Delete { id: id.clone() }).await;
        if self.is_failing(Op::Delete) {
            return Err(TransportError::DeleteFailed {
                id: id.clone(),
                reason: "injected failure".to_string(),
            });
        }
        match lock(&self.messages).remove(id) {
            Some(_) => Ok(()),
            None => Err(TransportError::UnknownMessage { id: id.clone() }),
        }
    }

    async fn add_reaction(
        &self,
        message: &SentMessage,
        emoji: &str,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::React {
            id: message.id.clone(),
            emoji: emoji.to_string(),
        })
        .await;
        if self.is_failing(Op::React) {
            return Err(TransportError::ReactionFailed {
                id: message.id.clone(),
                emoji: emoji.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_edit_delete() {
        let transport = MemoryTransport::new();
        let sent = transport
            .send_message("c1", &RenderResult::text("one"))
            .await
            .unwrap();
        assert!(sent.editable);

        let edited = transport
            .edit_message(&sent, &RenderResult::text("two"))
            .await
            .unwrap();
        assert_eq!(edited.id, sent.id);
        assert_eq!(
            transport.content_of(&sent.id),
            Some(RenderResult::text("two"))
        );

        transport.delete_message("c1", &sent.id).await.unwrap();
        assert!(transport.content_of(&sent.id).is_none());
        assert_eq!(transport.sends(), 1);
        assert_eq!(transport.edits(), 1);
        assert_eq!(transport.deletes(), 1);
    }

    #[tokio::test]
    async fn test_replace_on_edit() {
        let transport = MemoryTransport::new();
        transport.set_replace_on_edit(true);
        let sent = transport
            .send_message("c1", &RenderResult::text("one"))
            .await
            .unwrap();
        let edited = transport
            .edit_message(&sent, &RenderResult::text("two"))
            .await
            .unwrap();
        assert_ne!(edited.id, sent.id);
        assert_eq!(transport.live_messages(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures_are_recorded() {
        let transport = MemoryTransport::new();
        transport.set_failing(Op::Send, true);
        let err = transport
            .send_message("c1", &RenderResult::text("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::SendFailed { .. }));
        assert_eq!(transport.sends(), 1);
        assert_eq!(transport.live_messages(), 0);
    }

    #[tokio::test]
    async fn test_delete_unknown() {
        let transport = MemoryTransport::new();
        let err = transport
            .delete_message("c1", &MessageId::from("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownMessage { .. }));
    }
}
