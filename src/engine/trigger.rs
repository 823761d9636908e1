//! Reaction-bound actions.

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::engine::message::{InteractiveMessage, MessageView};
use crate::error::Result;

/// What a trigger does when its reaction is added.
///
/// `apply` runs while the owning message's lock is held, so it sees and
/// mutates the view without racing renders or other triggers. Return `true`
/// when the view changed and should be re-rendered.
///
/// Do not call [`InteractiveMessage::destroy`] or
/// [`InteractiveMessage::update`] from inside `apply`: both need the lock.
/// Use [`InteractiveMessage::schedule_destroy`] instead.
#[async_trait]
pub trait TriggerAction<V: MessageView>: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    async fn apply(&self, view: &mut V, message: &InteractiveMessage<V>, actor: &str)
    -> Result<bool>;
}

/// A trigger as declared by a view: a reaction marker and its action.
pub struct TriggerSpec<V: MessageView> {
    pub emoji: String,
    pub action: Arc<dyn TriggerAction<V>>,
}

impl<V: MessageView> TriggerSpec<V> {
    pub fn new(emoji: impl Into<String>, action: impl TriggerAction<V> + 'static) -> Self {
        Self {
            emoji: emoji.into(),
            action: Arc::new(action),
        }
    }
}

/// Type-erased trigger, as looked up by the dispatcher.
#[async_trait]
pub trait Trigger: Send + Sync {
    fn emoji(&self) -> &str;

    fn name(&self) -> &'static str;

    /// Run the action against the owning message.
    ///
    /// Returns whether the message was re-rendered. A trigger whose message
    /// is gone or no longer published has no effect.
    async fn invoke(&self, actor: &str) -> Result<bool>;
}

/// A trigger bound to one interactive message.
pub struct ReactionTrigger<V: MessageView> {
    message: Weak<InteractiveMessage<V>>,
    emoji: String,
    action: Arc<dyn TriggerAction<V>>,
}

impl<V: MessageView> ReactionTrigger<V> {
    pub(crate) fn bind(message: Weak<InteractiveMessage<V>>, spec: TriggerSpec<V>) -> Self {
        Self {
            message,
            emoji: spec.emoji,
            action: spec.action,
        }
    }
}

#[async_trait]
impl<V: MessageView> Trigger for ReactionTrigger<V> {
    fn emoji(&self) -> &str {
        &self.emoji
    }

    fn name(&self) -> &'static str {
        self.action.name()
    }

    async fn invoke(&self, actor: &str) -> Result<bool> {
        let Some(message) = self.message.upgrade() else {
            return Ok(false);
        };

        let changed = {
            let mut state = message.state.lock().await;
            if state.output.is_none() {
                tracing::debug!(
                    trigger = self.action.name(),
                    message = %message.id(),
                    "Trigger on unpublished message ignored"
                );
                return Ok(false);
            }
            self.action.apply(&mut state.view, &message, actor).await?
        };

        tracing::debug!(
            trigger = self.action.name(),
            kind = V::KIND,
            message = %message.id(),
            actor,
            changed,
            "Trigger invoked"
        );

        if !changed {
            return Ok(false);
        }
        message.update().await
    }
}

impl<V: MessageView> fmt::Debug for ReactionTrigger<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionTrigger")
            .field("emoji", &self.emoji)
            .field("action", &self.action.name())
            .finish()
    }
}
