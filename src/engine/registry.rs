//! Lookup tables used by the dispatcher to route incoming events.
//!
//! - [`MessageRegistry`] maps the platform id of a published message to the
//!   interactive message that owns it. An entry exists exactly while the
//!   message has an output; entries are only written by the owning message
//!   while it holds its own lock.
//! - [`PendingInputs`] tracks every input currently awaiting a reply.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::engine::input::{ReplySlot, Settlement};
use crate::engine::trigger::Trigger;
use crate::error::Result;
use crate::transport::{IncomingReply, MessageId};

/// Type-erased view of an interactive message, as stored in the registry.
#[async_trait]
pub trait RegisteredMessage: Send + Sync {
    /// Engine-side id of the message (stable across re-publishes).
    fn instance_id(&self) -> Uuid;

    /// Name of the message variant, for logs.
    fn kind(&self) -> &'static str;

    /// Trigger bound to `emoji`, if any.
    fn trigger(&self, emoji: &str) -> Option<Arc<dyn Trigger>>;

    async fn update(&self) -> Result<bool>;

    async fn destroy(&self, expiring: bool);
}

/// Registry of published interactive messages.
pub struct MessageRegistry {
    messages: RwLock<HashMap<MessageId, Arc<dyn RegisteredMessage>>>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
        }
    }

    /// Look up the message published under `id`.
    pub async fn get(&self, id: &MessageId) -> Option<Arc<dyn RegisteredMessage>> {
        self.messages.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &MessageId) -> bool {
        self.messages.read().await.contains_key(id)
    }

    /// Number of currently published messages.
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }

    /// Ids of all published messages.
    pub async fn ids(&self) -> Vec<MessageId> {
        self.messages.read().await.keys().cloned().collect()
    }

    /// All published messages.
    pub async fn all(&self) -> Vec<Arc<dyn RegisteredMessage>> {
        self.messages.read().await.values().cloned().collect()
    }

    /// Move a message from `old` to `new` in one step.
    pub(crate) async fn rekey(
        &self,
        old: Option<&MessageId>,
        new: MessageId,
        message: Arc<dyn RegisteredMessage>,
    ) {
        let mut messages = self.messages.write().await;
        if let Some(old) = old {
            messages.remove(old);
        }
        tracing::debug!(kind = message.kind(), id = %new, "Registered interactive message");
        messages.insert(new, message);
    }

    pub(crate) async fn remove(&self, id: &MessageId) -> Option<Arc<dyn RegisteredMessage>> {
        self.messages.write().await.remove(id)
    }
}

impl Default for MessageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A pending input as seen by the dispatcher.
struct PendingEntry {
    /// Registration order; higher is more recent.
    seq: u64,
    channel_id: String,
    /// Only replies from this user resolve the input. `None` accepts anyone.
    responder: Option<String>,
    slot: Arc<ReplySlot>,
}

#[derive(Default)]
struct PendingSet {
    next_seq: u64,
    entries: HashMap<Uuid, PendingEntry>,
}

/// Set of inputs currently waiting for a reply.
///
/// Replies are routed to the most recently registered input in the same
/// channel whose responder matches the replying user.
#[derive(Default)]
pub struct PendingInputs {
    inner: Mutex<PendingSet>,
}

impl PendingInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.lock().entries.contains_key(&id)
    }

    /// Number of pending inputs in one channel.
    pub fn pending_in(&self, channel_id: &str) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|e| e.channel_id == channel_id)
            .count()
    }

    /// Register an input. It stays registered until the returned guard drops.
    pub(crate) fn register(
        &self,
        id: Uuid,
        channel_id: &str,
        responder: Option<&str>,
        slot: Arc<ReplySlot>,
    ) -> PendingRegistration<'_> {
        let mut set = self.lock();
        let seq = set.next_seq;
        set.next_seq += 1;
        set.entries.insert(
            id,
            PendingEntry {
                seq,
                channel_id: channel_id.to_string(),
                responder: responder.map(String::from),
                slot,
            },
        );
        PendingRegistration { set: self, id }
    }

    /// Hand a reply to the input it answers.
    ///
    /// Returns `true` if some pending input accepted it.
    pub fn resolve_reply(&self, reply: &IncomingReply) -> bool {
        let mut candidates: Vec<(u64, Arc<ReplySlot>)> = self
            .lock()
            .entries
            .values()
            .filter(|e| e.channel_id == reply.channel_id)
            .filter(|e| e.responder.as_deref().is_none_or(|r| r == reply.user_id))
            .map(|e| (e.seq, Arc::clone(&e.slot)))
            .collect();
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        // An input that already settled may still be registered; fall back to
        // the next most recent one.
        candidates
            .into_iter()
            .any(|(_, slot)| slot.settle(Settlement::Reply(reply.clone())))
    }

    fn deregister(&self, id: Uuid) {
        self.lock().entries.remove(&id);
    }

    fn lock(&self) -> MutexGuard<'_, PendingSet> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Keeps an input in the pending set while alive.
pub(crate) struct PendingRegistration<'a> {
    set: &'a PendingInputs,
    id: Uuid,
}

impl Drop for PendingRegistration<'_> {
    fn drop(&mut self) {
        self.set.deregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(channel: &str, user: &str, content: &str) -> IncomingReply {
        IncomingReply {
            message_id: MessageId::from("u1"),
            channel_id: channel.to_string(),
            user_id: user.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_registration_guard_deregisters() {
        let pending = PendingInputs::new();
        let (slot, _rx) = ReplySlot::new();
        let id = Uuid::new_v4();
        {
            let _reg = pending.register(id, "c1", Some("u1"), slot);
            assert!(pending.contains(id));
            assert_eq!(pending.len(), 1);
            assert_eq!(pending.pending_in("c1"), 1);
            assert_eq!(pending.pending_in("c2"), 0);
        }
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_reply_goes_to_most_recent_matching_input() {
        let pending = PendingInputs::new();
        let (older, older_rx) = ReplySlot::new();
        let (newer, newer_rx) = ReplySlot::new();
        let (other_user, mut other_rx) = ReplySlot::new();
        let _a = pending.register(Uuid::new_v4(), "c1", Some("u1"), older);
        let _b = pending.register(Uuid::new_v4(), "c1", Some("u1"), newer);
        let _c = pending.register(Uuid::new_v4(), "c1", Some("u2"), other_user);

        assert!(pending.resolve_reply(&reply("c1", "u1", "first")));
        assert!(matches!(newer_rx.await, Ok(Settlement::Reply(r)) if r.content == "first"));

        // The newer slot is spent; the next reply falls back to the older one
        assert!(pending.resolve_reply(&reply("c1", "u1", "second")));
        assert!(matches!(older_rx.await, Ok(Settlement::Reply(r)) if r.content == "second"));

        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn test_reply_in_other_channel_is_ignored() {
        let pending = PendingInputs::new();
        let (slot, _rx) = ReplySlot::new();
        let _reg = pending.register(Uuid::new_v4(), "c1", None, slot);
        assert!(!pending.resolve_reply(&reply("c2", "u1", "hi")));
        assert!(pending.resolve_reply(&reply("c1", "anyone", "hi")));
    }

    #[tokio::test]
    async fn test_message_registry_starts_empty() {
        let registry = MessageRegistry::new();
        assert!(registry.is_empty().await);
        assert!(registry.get(&MessageId::from("m1")).await.is_none());
        assert!(registry.remove(&MessageId::from("m1")).await.is_none());
    }
}
