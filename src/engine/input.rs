//! One-shot prompt/reply primitive.
//!
//! An [`InteractiveInput`] posts a prompt into a conversation and waits for
//! the user to answer. The wait ends in exactly one of three ways: a reply
//! arrives, the timeout elapses, or the owner rejects the input. The last two
//! are indistinguishable to the caller, who just sees `None`.
//!
//! Whatever happens, the input leaves the pending set and its prompt (and the
//! user's reply, if any) are deleted from the channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::context::ConversationContext;
use crate::engine::RenderResult;
use crate::engine::registry::PendingInputs;
use crate::transport::IncomingReply;

/// How a pending input was settled.
#[derive(Debug)]
pub(crate) enum Settlement {
    Reply(IncomingReply),
    Rejected,
}

/// Write side of an input's resolver. Settles at most once.
pub(crate) struct ReplySlot {
    tx: Mutex<Option<oneshot::Sender<Settlement>>>,
}

impl ReplySlot {
    pub(crate) fn new() -> (Arc<Self>, oneshot::Receiver<Settlement>) {
        let (tx, rx) = oneshot::channel();
        (
            Arc::new(Self {
                tx: Mutex::new(Some(tx)),
            }),
            rx,
        )
    }

    /// Returns `false` if the slot was already settled.
    pub(crate) fn settle(&self, settlement: Settlement) -> bool {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
        match tx {
            Some(tx) => tx.send(settlement).is_ok(),
            None => false,
        }
    }
}

/// A prompt waiting for a text reply.
pub struct InteractiveInput {
    id: Uuid,
    ctx: Arc<ConversationContext>,
    responder: Option<String>,
    pending: Arc<PendingInputs>,
    default_timeout: Duration,
    slot: Arc<ReplySlot>,
    rx: Mutex<Option<oneshot::Receiver<Settlement>>>,
}

impl InteractiveInput {
    /// Create an input answered by the user who opened `ctx`.
    pub fn new(
        ctx: Arc<ConversationContext>,
        pending: Arc<PendingInputs>,
        default_timeout: Duration,
    ) -> Self {
        let responder = Some(ctx.user_id().to_string());
        let (slot, rx) = ReplySlot::new();
        Self {
            id: Uuid::new_v4(),
            ctx,
            responder,
            pending,
            default_timeout,
            slot,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Accept replies from anyone in the channel.
    pub fn from_anyone(mut self) -> Self {
        self.responder = None;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Give up on the input. A pending `send` returns `None`; a later one
    /// returns `None` without waiting.
    pub fn reject(&self) -> bool {
        self.slot.settle(Settlement::Rejected)
    }

    /// Resolve the input with a reply, bypassing the dispatcher.
    pub fn resolve(&self, reply: IncomingReply) -> bool {
        self.slot.settle(Settlement::Reply(reply))
    }

    /// Post `prompt` and wait up to `timeout` (or the configured default) for
    /// the answer.
    ///
    /// An input can only be sent once; further calls return `None`.
    pub async fn send(&self, prompt: &str, timeout: Option<Duration>) -> Option<String> {
        let mut rx = self.rx.lock().unwrap_or_else(|e| e.into_inner()).take()?;
        let timeout = timeout.unwrap_or(self.default_timeout);

        // Settled before anything was posted: nothing to clean up
        if let Ok(settlement) = rx.try_recv() {
            return self.finish(settlement).await;
        }

        let registration = self.pending.register(
            self.id,
            self.ctx.channel_id(),
            self.responder.as_deref(),
            Arc::clone(&self.slot),
        );

        let prompt_message = match self.ctx.send(&RenderResult::text(prompt)).await {
            Ok(sent) => Some(sent),
            Err(e) => {
                tracing::warn!(
                    channel = %self.ctx.channel_id(),
                    "Failed to send input prompt: {}",
                    e
                );
                None
            }
        };

        let settlement = match prompt_message {
            Some(_) => match tokio::time::timeout(timeout, &mut rx).await {
                Ok(Ok(settlement)) => settlement,
                Ok(Err(_)) => Settlement::Rejected,
                Err(_) => {
                    tracing::debug!(input = %self.id, "Input timed out after {:?}", timeout);
                    drain(&mut rx)
                }
            },
            None => drain(&mut rx),
        };

        drop(registration);

        if let Some(prompt_message) = prompt_message {
            self.ctx.delete_quietly(&prompt_message.id).await;
        }
        self.finish(settlement).await
    }

    async fn finish(&self, settlement: Settlement) -> Option<String> {
        match settlement {
            Settlement::Reply(reply) => {
                self.ctx.delete_quietly(&reply.message_id).await;
                Some(reply.content)
            }
            Settlement::Rejected => None,
        }
    }
}

/// Stop accepting settlements and take one that raced in, if any.
///
/// Once closed, a late `settle` fails and the dispatcher moves on to the next
/// candidate input.
fn drain(rx: &mut oneshot::Receiver<Settlement>) -> Settlement {
    rx.close();
    rx.try_recv().unwrap_or(Settlement::Rejected)
}

impl std::fmt::Debug for InteractiveInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveInput")
            .field("id", &self.id)
            .field("channel_id", &self.ctx.channel_id())
            .field("responder", &self.responder)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryTransport, Op, TransportCall};

    fn setup() -> (Arc<MemoryTransport>, Arc<ConversationContext>, Arc<PendingInputs>) {
        let transport = Arc::new(MemoryTransport::new());
        let ctx = ConversationContext::new("c1", "u1", transport.clone());
        (transport, ctx, Arc::new(PendingInputs::new()))
    }

    fn reply_from(transport: &MemoryTransport, user: &str, content: &str) -> IncomingReply {
        IncomingReply {
            message_id: transport.post_user_message(content),
            channel_id: "c1".to_string(),
            user_id: user.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_reply_before_timeout() {
        let (transport, ctx, pending) = setup();
        let input = Arc::new(InteractiveInput::new(ctx, pending.clone(), Duration::from_secs(5)));

        let waiter = {
            let input = Arc::clone(&input);
            tokio::spawn(async move { input.send("Your name?", None).await })
        };

        while !pending.contains(input.id()) {
            tokio::task::yield_now().await;
        }
        let reply = reply_from(&transport, "u1", "Ferris");
        let reply_id = reply.message_id.clone();
        assert!(pending.resolve_reply(&reply));

        assert_eq!(waiter.await.unwrap(), Some("Ferris".to_string()));
        assert!(pending.is_empty());
        // Prompt and reply are both cleaned up
        assert_eq!(transport.deletes(), 2);
        assert!(transport.deleted(&reply_id));
        assert_eq!(transport.live_messages(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_no_answer() {
        let (transport, ctx, pending) = setup();
        let input = InteractiveInput::new(ctx, pending.clone(), Duration::from_secs(60));

        let answer = input.send("prompt?", Some(Duration::from_secs(1))).await;
        assert_eq!(answer, None);
        assert!(pending.is_empty());

        let calls = transport.calls();
        assert!(matches!(calls[0], TransportCall::Send { .. }));
        assert_eq!(transport.deletes(), 1);
    }

    #[tokio::test]
    async fn test_reject_before_send() {
        let (transport, ctx, pending) = setup();
        let input = InteractiveInput::new(ctx, pending.clone(), Duration::from_secs(60));
        assert!(input.reject());
        assert!(!input.reject());

        assert_eq!(input.send("prompt?", None).await, None);
        assert!(pending.is_empty());
        // Nothing is posted for an input that is already settled
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_resolved_before_send_skips_prompt() {
        let (transport, ctx, pending) = setup();
        let input = InteractiveInput::new(ctx, pending.clone(), Duration::from_secs(60));
        let reply = reply_from(&transport, "u1", "early");
        let reply_id = reply.message_id.clone();
        assert!(input.resolve(reply));

        assert_eq!(input.send("prompt?", None).await, Some("early".to_string()));
        assert_eq!(transport.sends(), 0);
        assert_eq!(transport.deletes(), 1);
        assert!(transport.deleted(&reply_id));
    }

    #[test]
    fn test_drain_takes_reply_that_raced_the_timeout() {
        let (slot, mut rx) = ReplySlot::new();
        let reply = IncomingReply {
            message_id: "u9".into(),
            channel_id: "c1".to_string(),
            user_id: "u1".to_string(),
            content: "late".to_string(),
        };
        assert!(slot.settle(Settlement::Reply(reply)));
        assert!(matches!(drain(&mut rx), Settlement::Reply(r) if r.content == "late"));
    }

    #[test]
    fn test_drain_refuses_later_settlements() {
        let (slot, mut rx) = ReplySlot::new();
        assert!(matches!(drain(&mut rx), Settlement::Rejected));
        // The dispatcher sees the input as gone and can try the next one
        assert!(!slot.settle(Settlement::Rejected));
    }

    #[tokio::test]
    async fn test_send_is_one_shot() {
        let (_transport, ctx, pending) = setup();
        let input = InteractiveInput::new(ctx, pending, Duration::from_secs(60));
        input.reject();
        assert_eq!(input.send("a", None).await, None);
        assert_eq!(input.send("b", None).await, None);
    }

    #[tokio::test]
    async fn test_failed_prompt_is_no_answer() {
        let (transport, ctx, pending) = setup();
        transport.set_failing(Op::Send, true);
        let input = InteractiveInput::new(ctx, pending.clone(), Duration::from_secs(60));

        assert_eq!(input.send("prompt?", None).await, None);
        assert!(pending.is_empty());
        assert_eq!(transport.deletes(), 0);
    }

    #[tokio::test]
    async fn test_delete_failures_are_swallowed() {
        let (transport, ctx, pending) = setup();
        transport.set_failing(Op::Delete, true);
        let input = Arc::new(InteractiveInput::new(ctx, pending.clone(), Duration::from_secs(5)));

        let waiter = {
            let input = Arc::clone(&input);
            tokio::spawn(async move { input.send("prompt?", None).await })
        };
        while !pending.contains(input.id()) {
            tokio::task::yield_now().await;
        }
        assert!(input.resolve(reply_from(&transport, "u1", "yes")));
        assert_eq!(waiter.await.unwrap(), Some("yes".to_string()));
        assert_eq!(transport.deletes(), 2);
        // Prompt and reply are still on screen
        assert_eq!(transport.live_messages(), 2);
    }

    #[tokio::test]
    async fn test_other_users_cannot_answer() {
        let (transport, ctx, pending) = setup();
        let input = Arc::new(InteractiveInput::new(ctx, pending.clone(), Duration::from_secs(5)));
        let waiter = {
            let input = Arc::clone(&input);
            tokio::spawn(async move { input.send("prompt?", None).await })
        };
        while !pending.contains(input.id()) {
            tokio::task::yield_now().await;
        }
        assert!(!pending.resolve_reply(&reply_from(&transport, "intruder", "no")));
        assert!(pending.resolve_reply(&reply_from(&transport, "u1", "ok")));
        assert_eq!(waiter.await.unwrap(), Some("ok".to_string()));
    }
}
