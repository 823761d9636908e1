//! Interactive message engine.
//!
//! The [`Engine`] owns the registries shared by all interactive messages and
//! routes incoming transport events to them:
//!
//! ```text
//!                     ┌──────────────────────────────┐
//!  EventStream ──────►│           Engine             │
//!                     │                              │
//!   ReactionAdded ────┼─► MessageRegistry ─► Trigger ─┼─► InteractiveMessage::update
//!   TextReply ────────┼─► PendingInputs ─► InteractiveInput
//!                     └──────────────────────────────┘
//! ```

mod input;
mod message;
mod registry;
mod render;
mod trigger;

use std::sync::Arc;

use futures::StreamExt;

use crate::config::EngineConfig;
use crate::context::ConversationContext;
use crate::error::Result;
use crate::transport::{EventStream, IncomingEvent, IncomingReply, ReactionEvent};

pub use input::InteractiveInput;
pub use message::{InteractiveMessage, MessageState, MessageView};
pub use registry::{MessageRegistry, PendingInputs, RegisteredMessage};
pub use render::{Embed, EmbedField, RenderResult};
pub use trigger::{ReactionTrigger, Trigger, TriggerAction, TriggerSpec};

/// Outcome of dispatching one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// No message, trigger or input matched the event.
    Ignored,
    /// A trigger ran; `rerendered` tells whether the message was edited.
    Triggered { rerendered: bool },
    /// The reply settled a pending input.
    Replied,
}

/// Entry point for command handlers and the transport event loop.
pub struct Engine {
    config: EngineConfig,
    registry: Arc<MessageRegistry>,
    pending: Arc<PendingInputs>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: Arc::new(MessageRegistry::new()),
            pending: Arc::new(PendingInputs::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<MessageRegistry> {
        &self.registry
    }

    pub fn pending_inputs(&self) -> &Arc<PendingInputs> {
        &self.pending
    }

    /// Create an interactive message in `ctx`. Call `update()` to publish it.
    pub fn create<V: MessageView>(
        &self,
        ctx: Arc<ConversationContext>,
        view: V,
    ) -> Arc<InteractiveMessage<V>> {
        let message = InteractiveMessage::new(
            ctx,
            view,
            self.config.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.pending),
        );
        tracing::debug!(kind = V::KIND, message = %message.id(), "Created interactive message");
        message
    }

    /// Create a standalone input, not owned by any message.
    pub fn input(&self, ctx: Arc<ConversationContext>) -> InteractiveInput {
        InteractiveInput::new(ctx, Arc::clone(&self.pending), self.config.input_timeout)
    }

    /// Route one incoming event.
    pub async fn dispatch(&self, event: IncomingEvent) -> Result<Dispatch> {
        match event {
            IncomingEvent::ReactionAdded(reaction) => self.dispatch_reaction(&reaction).await,
            IncomingEvent::TextReply(reply) => Ok(self.dispatch_reply(&reply)),
        }
    }

    async fn dispatch_reaction(&self, reaction: &ReactionEvent) -> Result<Dispatch> {
        if reaction.from_self {
            return Ok(Dispatch::Ignored);
        }
        let Some(message) = self.registry.get(&reaction.message_id).await else {
            return Ok(Dispatch::Ignored);
        };
        let Some(trigger) = message.trigger(&reaction.emoji) else {
            tracing::debug!(
                kind = message.kind(),
                emoji = %reaction.emoji,
                "No trigger for reaction"
            );
            return Ok(Dispatch::Ignored);
        };
        let rerendered = trigger.invoke(&reaction.user_id).await?;
        Ok(Dispatch::Triggered { rerendered })
    }

    fn dispatch_reply(&self, reply: &IncomingReply) -> Dispatch {
        if self.pending.resolve_reply(reply) {
            Dispatch::Replied
        } else {
            Dispatch::Ignored
        }
    }

    /// Dispatch events until the stream ends.
    ///
    /// Each event is handled on its own task: a trigger waiting for a reply
    /// must not hold up the reply itself.
    pub async fn run(self: Arc<Self>, mut events: EventStream) {
        tracing::info!("Interactive message engine started");
        while let Some(event) = events.next().await {
            let engine = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = engine.dispatch(event).await {
                    tracing::warn!("Event dispatch failed: {}", e);
                }
            });
        }
        tracing::info!("Event stream closed");
    }

    /// Expire every published message. Their platform messages stay.
    pub async fn shutdown(&self) {
        let messages = self.registry.all().await;
        let count = messages.len();
        for message in messages {
            message.destroy(true).await;
        }
        tracing::info!("Expired {} interactive message(s)", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryTransport, MessageId};
    use async_trait::async_trait;

    struct Static(&'static str);

    #[async_trait]
    impl MessageView for Static {
        const KIND: &'static str = "static";

        async fn render(&mut self, _message: &InteractiveMessage<Self>) -> Result<RenderResult> {
            Ok(RenderResult::text(self.0))
        }
    }

    fn reaction(message_id: &MessageId, emoji: &str, from_self: bool) -> IncomingEvent {
        IncomingEvent::ReactionAdded(ReactionEvent {
            message_id: message_id.clone(),
            channel_id: "c1".to_string(),
            user_id: "u1".to_string(),
            emoji: emoji.to_string(),
            from_self,
        })
    }

    #[tokio::test]
    async fn test_unknown_events_are_ignored() {
        let engine = Engine::new(EngineConfig::default());
        let event = reaction(&MessageId::from("m404"), "👍", false);
        assert_eq!(engine.dispatch(event).await.unwrap(), Dispatch::Ignored);

        let reply = IncomingEvent::TextReply(IncomingReply {
            message_id: MessageId::from("u1"),
            channel_id: "c1".to_string(),
            user_id: "u1".to_string(),
            content: "hello".to_string(),
        });
        assert_eq!(engine.dispatch(reply).await.unwrap(), Dispatch::Ignored);
    }

    #[tokio::test]
    async fn test_reaction_without_trigger_is_ignored() {
        let engine = Engine::new(EngineConfig::default());
        let transport = Arc::new(MemoryTransport::new());
        let ctx = ConversationContext::new("c1", "u1", transport);
        let message = engine.create(ctx, Static("hi"));
        message.update().await.unwrap();
        let output = message.output().await.unwrap();

        let event = reaction(&output.id, "👍", false);
        assert_eq!(engine.dispatch(event).await.unwrap(), Dispatch::Ignored);
    }

    #[tokio::test]
    async fn test_shutdown_expires_everything() {
        let engine = Engine::new(EngineConfig::default());
        let transport = Arc::new(MemoryTransport::new());
        let ctx = ConversationContext::new("c1", "u1", transport.clone());
        let a = engine.create(Arc::clone(&ctx), Static("a"));
        let b = engine.create(Arc::clone(&ctx), Static("b"));
        a.update().await.unwrap();
        b.update().await.unwrap();
        assert_eq!(engine.registry().len().await, 2);
        assert_eq!(ctx.holders(), 2);

        engine.shutdown().await;
        assert!(engine.registry().is_empty().await);
        assert_eq!(ctx.holders(), 0);
        // Expiry keeps the platform messages
        assert_eq!(transport.deletes(), 0);
        assert_eq!(transport.live_messages(), 2);
    }

    #[tokio::test]
    async fn test_standalone_input_resolved_by_dispatch() {
        let engine = Engine::new(EngineConfig::default());
        let transport = Arc::new(MemoryTransport::new());
        let ctx = ConversationContext::new("c1", "u1", transport.clone());
        let input = Arc::new(engine.input(ctx).from_anyone());

        let waiter = {
            let input = Arc::clone(&input);
            tokio::spawn(async move { input.send("Anyone?", None).await })
        };
        while !engine.pending_inputs().contains(input.id()) {
            tokio::task::yield_now().await;
        }

        let reply = IncomingEvent::TextReply(IncomingReply {
            message_id: transport.post_user_message("me"),
            channel_id: "c1".to_string(),
            user_id: "someone-else".to_string(),
            content: "me".to_string(),
        });
        assert_eq!(engine.dispatch(reply).await.unwrap(), Dispatch::Replied);
        assert_eq!(waiter.await.unwrap(), Some("me".to_string()));
    }
}
