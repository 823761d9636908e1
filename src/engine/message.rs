//! Interactive messages: chat messages that re-render in place.
//!
//! An [`InteractiveMessage`] wraps a [`MessageView`] (the variant-specific
//! state and rendering) and drives its lifecycle:
//!
//! ```text
//!   Fresh ── update() ──► Active ── update() ──► Active
//!     │                     │
//!     └──── destroy() ──────┴──── destroy() / expiry ──► Destroyed
//! ```
//!
//! `update`, `destroy` and trigger actions all run under one per-message
//! lock. Inputs opened with [`InteractiveMessage::wait_input`] do not take
//! the lock, and `destroy` rejects them *before* locking, so a render or
//! trigger blocked on a reply can never deadlock a concurrent destroy.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::context::ConversationContext;
use crate::engine::RenderResult;
use crate::engine::input::InteractiveInput;
use crate::engine::registry::{MessageRegistry, PendingInputs, RegisteredMessage};
use crate::engine::trigger::{ReactionTrigger, Trigger, TriggerSpec};
use crate::error::Result;
use crate::transport::SentMessage;

/// Variant-specific behavior of an interactive message.
#[async_trait]
pub trait MessageView: Send + Sized + 'static {
    /// Variant name, used in logs.
    const KIND: &'static str;

    /// Produce the current content. An empty result leaves the message as
    /// it is.
    async fn render(&mut self, message: &InteractiveMessage<Self>) -> Result<RenderResult>;

    /// Triggers to attach whenever the message is (re-)published.
    fn create_triggers(&self) -> Vec<TriggerSpec<Self>> {
        Vec::new()
    }

    /// Publish once, then stop being interactive.
    fn render_once(&self) -> bool {
        false
    }
}

/// Lifecycle state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    /// Constructed, never published.
    Fresh,
    /// Published and accepting triggers.
    Active,
    /// Terminal.
    Destroyed,
}

/// Everything guarded by the message lock.
pub(crate) struct Locked<V> {
    pub(crate) view: V,
    pub(crate) output: Option<SentMessage>,
    last_render: Option<RenderResult>,
    destroyed: bool,
}

/// Reactions to attach once the lock is released.
struct PendingReactions {
    output: SentMessage,
    emojis: Vec<String>,
}

pub struct InteractiveMessage<V: MessageView> {
    id: Uuid,
    ctx: Arc<ConversationContext>,
    config: EngineConfig,
    registry: Arc<MessageRegistry>,
    pending: Arc<PendingInputs>,
    render_once: bool,
    pub(crate) state: tokio::sync::Mutex<Locked<V>>,
    triggers: RwLock<Vec<Arc<ReactionTrigger<V>>>>,
    inputs: Mutex<HashMap<Uuid, Arc<InteractiveInput>>>,
    expiry: Mutex<Option<JoinHandle<()>>>,
    /// Set as the first step of `destroy`.
    closing: AtomicBool,
    this: Weak<Self>,
}

impl<V: MessageView> InteractiveMessage<V> {
    pub(crate) fn new(
        ctx: Arc<ConversationContext>,
        view: V,
        config: EngineConfig,
        registry: Arc<MessageRegistry>,
        pending: Arc<PendingInputs>,
    ) -> Arc<Self> {
        ctx.retain();
        let render_once = view.render_once();
        Arc::new_cyclic(|this| Self {
            id: Uuid::new_v4(),
            ctx,
            config,
            registry,
            pending,
            render_once,
            state: tokio::sync::Mutex::new(Locked {
                view,
                output: None,
                last_render: None,
                destroyed: false,
            }),
            triggers: RwLock::new(Vec::new()),
            inputs: Mutex::new(HashMap::new()),
            expiry: Mutex::new(None),
            closing: AtomicBool::new(false),
            this: this.clone(),
        })
    }

    /// Engine-side id, stable across re-publishes.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &'static str {
        V::KIND
    }

    pub fn context(&self) -> &Arc<ConversationContext> {
        &self.ctx
    }

    /// Handle of the published message, if any. Waits for the lock.
    pub async fn output(&self) -> Option<SentMessage> {
        self.state.lock().await.output.clone()
    }

    /// Current lifecycle state. Waits for the lock.
    pub async fn state(&self) -> MessageState {
        let state = self.state.lock().await;
        if state.destroyed {
            MessageState::Destroyed
        } else if state.output.is_some() {
            MessageState::Active
        } else {
            MessageState::Fresh
        }
    }

    /// True once `destroy` has started.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Reaction markers of the current triggers.
    pub fn trigger_emojis(&self) -> Vec<String> {
        read(&self.triggers)
            .iter()
            .map(|t| t.emoji().to_string())
            .collect()
    }

    /// Number of inputs currently waiting for a reply on this message.
    pub fn open_inputs(&self) -> usize {
        lock(&self.inputs).len()
    }

    /// Run `f` against the view under the message lock.
    pub async fn with_view<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&self.state.lock().await.view)
    }

    /// Re-render and publish the message.
    ///
    /// Returns `true` when the content on the platform changed. Failing to
    /// publish or edit is returned as an error; the previous output stays in
    /// place.
    pub async fn update(&self) -> Result<bool> {
        if self.is_closing() {
            return Ok(false);
        }
        self.refresh_expiry();

        let started = Instant::now();
        let attach = {
            let mut state = self.state.lock().await;
            self.update_locked(&mut state).await?
        };

        let changed = attach.is_some();
        tracing::debug!(
            kind = V::KIND,
            message = %self.id,
            changed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rendered interactive message"
        );

        if let Some(Some(reactions)) = attach {
            self.attach_reactions(reactions);
        }
        if changed && self.render_once {
            self.schedule_destroy(true);
        }
        Ok(changed)
    }

    /// Locked part of `update`. `None` means nothing was sent; `Some(r)`
    /// carries the reactions to attach when the output identity changed.
    async fn update_locked(
        &self,
        state: &mut Locked<V>,
    ) -> Result<Option<Option<PendingReactions>>> {
        if state.destroyed {
            return Ok(None);
        }

        let rendered = state.view.render(self).await?;
        if rendered.is_empty() || self.is_closing() {
            return Ok(None);
        }

        let editable = state.output.as_ref().is_some_and(|o| o.editable);
        if editable && state.last_render.as_ref() == Some(&rendered) {
            return Ok(None);
        }

        let previous = state.output.clone();
        let sent = match previous.as_ref().filter(|o| o.editable) {
            Some(output) => self.ctx.transport().edit_message(output, &rendered).await?,
            None => self.ctx.send(&rendered).await?,
        };

        // A frozen output was superseded by a fresh post
        if let Some(stale) = previous.as_ref().filter(|o| !o.editable) {
            self.ctx.delete_quietly(&stale.id).await;
        }

        let mut reactions = None;
        if previous.as_ref().map(|o| &o.id) != Some(&sent.id) {
            if let Some(this) = self.this.upgrade() {
                self.registry
                    .rekey(previous.as_ref().map(|o| &o.id), sent.id.clone(), this)
                    .await;
            }
            let triggers: Vec<Arc<ReactionTrigger<V>>> = state
                .view
                .create_triggers()
                .into_iter()
                .map(|spec| Arc::new(ReactionTrigger::bind(self.this.clone(), spec)))
                .collect();
            let emojis = triggers.iter().map(|t| t.emoji().to_string()).collect();
            *write(&self.triggers) = triggers;
            reactions = Some(PendingReactions {
                output: sent.clone(),
                emojis,
            });
        }

        state.output = Some(sent);
        state.last_render = Some(rendered);
        Ok(Some(reactions))
    }

    /// Attach trigger reactions in the background. Failures are logged.
    fn attach_reactions(&self, reactions: PendingReactions) {
        if reactions.emojis.is_empty() {
            return;
        }
        let transport = Arc::clone(self.ctx.transport());
        let message = self.id;
        tokio::spawn(async move {
            for emoji in &reactions.emojis {
                if let Err(e) = transport.add_reaction(&reactions.output, emoji).await {
                    tracing::warn!(
                        message = %message,
                        output = %reactions.output.id,
                        "Failed to attach reaction {}: {}",
                        emoji,
                        e
                    );
                }
            }
        });
    }

    /// Tear the message down.
    ///
    /// With `expiring` set the published message is left on the platform;
    /// otherwise it is deleted (best effort). Calling this more than once is
    /// harmless.
    pub async fn destroy(&self, expiring: bool) {
        self.closing.store(true, Ordering::SeqCst);

        // Must happen before locking: a render or trigger holding the lock
        // may be waiting on one of these inputs.
        let inputs: Vec<Arc<InteractiveInput>> = lock(&self.inputs).values().cloned().collect();
        for input in inputs {
            input.reject();
        }

        let mut state = self.state.lock().await;
        if state.destroyed {
            return;
        }
        state.destroyed = true;
        self.ctx.release();
        self.cancel_expiry();

        if let Some(output) = state.output.as_ref() {
            self.registry.remove(&output.id).await;
            if !expiring {
                self.ctx.delete_quietly(&output.id).await;
            }
        }
        state.output = None;
        state.last_render = None;
        write(&self.triggers).clear();

        tracing::debug!(
            kind = V::KIND,
            message = %self.id,
            expiring,
            "Destroyed interactive message"
        );
    }

    /// Destroy the message from a spawned task.
    ///
    /// Safe to call while holding the message lock (e.g. from a trigger
    /// action): the destroy waits for the lock to be released.
    pub fn schedule_destroy(&self, expiring: bool) {
        if let Some(this) = self.this.upgrade() {
            tokio::spawn(async move { this.destroy(expiring).await });
        }
    }

    /// Ask the user who opened the conversation for a text reply.
    ///
    /// Returns `None` on timeout, or when the message is destroyed while
    /// waiting. Usable from `render` and trigger actions.
    pub async fn wait_input(&self, prompt: &str, timeout: Option<Duration>) -> Option<String> {
        let input = Arc::new(InteractiveInput::new(
            Arc::clone(&self.ctx),
            Arc::clone(&self.pending),
            self.config.input_timeout,
        ));
        lock(&self.inputs).insert(input.id(), Arc::clone(&input));
        let _owned = OwnedInput {
            inputs: &self.inputs,
            id: input.id(),
        };

        // `destroy` may have collected the owned set before the insert above
        if self.is_closing() {
            input.reject();
        }

        input.send(prompt, timeout).await
    }

    fn refresh_expiry(&self) {
        let Some(expiry) = self.config.message_expiry else {
            return;
        };
        let weak = self.this.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(expiry).await;
            if let Some(message) = weak.upgrade() {
                tracing::debug!(
                    kind = V::KIND,
                    message = %message.id,
                    "Interactive message expired"
                );
                tokio::spawn(async move { message.destroy(true).await });
            }
        });
        if let Some(previous) = lock(&self.expiry).replace(timer) {
            previous.abort();
        }
    }

    fn cancel_expiry(&self) {
        if let Some(timer) = lock(&self.expiry).take() {
            timer.abort();
        }
    }
}

impl<V: MessageView> Drop for InteractiveMessage<V> {
    fn drop(&mut self) {
        self.cancel_expiry();
    }
}

impl<V: MessageView> fmt::Debug for InteractiveMessage<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractiveMessage")
            .field("id", &self.id)
            .field("kind", &V::KIND)
            .field("channel_id", &self.ctx.channel_id())
            .field("closing", &self.is_closing())
            .finish()
    }
}

#[async_trait]
impl<V: MessageView> RegisteredMessage for InteractiveMessage<V> {
    fn instance_id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> &'static str {
        V::KIND
    }

    fn trigger(&self, emoji: &str) -> Option<Arc<dyn Trigger>> {
        read(&self.triggers)
            .iter()
            .find(|t| t.emoji() == emoji)
            .map(|t| Arc::clone(t) as Arc<dyn Trigger>)
    }

    async fn update(&self) -> Result<bool> {
        InteractiveMessage::update(self).await
    }

    async fn destroy(&self, expiring: bool) {
        InteractiveMessage::destroy(self, expiring).await
    }
}

/// Removes an input from its message's owned set when dropped.
struct OwnedInput<'a> {
    inputs: &'a Mutex<HashMap<Uuid, Arc<InteractiveInput>>>,
    id: Uuid,
}

impl Drop for OwnedInput<'_> {
    fn drop(&mut self) {
        lock(self.inputs).remove(&self.id);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn read<T>(l: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(l: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(|e| e.into_inner())
}
