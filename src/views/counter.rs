//! A shared counter driven by reactions.

use async_trait::async_trait;

use crate::engine::{
    Embed, InteractiveMessage, MessageView, RenderResult, TriggerAction, TriggerSpec,
};
use crate::error::{EngineError, Result};

pub const INCREMENT: &str = "➕";
pub const DECREMENT: &str = "➖";
pub const RESET: &str = "🔄";
pub const CLOSE: &str = "❌";

#[derive(Debug, Clone, Default)]
pub struct CounterView {
    title: String,
    value: i64,
    last_actor: Option<String>,
}

impl CounterView {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: 0,
            last_actor: None,
        }
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}

#[async_trait]
impl MessageView for CounterView {
    const KIND: &'static str = "counter";

    async fn render(&mut self, _message: &InteractiveMessage<Self>) -> Result<RenderResult> {
        let mut embed = Embed::new()
            .with_title(&self.title)
            .with_description(format!("Count: **{}**", self.value));
        if let Some(actor) = &self.last_actor {
            embed = embed.with_footer(format!("last change by {}", actor));
        }
        Ok(RenderResult::embed(embed))
    }

    fn create_triggers(&self) -> Vec<TriggerSpec<Self>> {
        vec![
            TriggerSpec::new(INCREMENT, Step(1)),
            TriggerSpec::new(DECREMENT, Step(-1)),
            TriggerSpec::new(RESET, Reset),
            TriggerSpec::new(CLOSE, Close),
        ]
    }
}

struct Step(i64);

#[async_trait]
impl TriggerAction<CounterView> for Step {
    fn name(&self) -> &'static str {
        if self.0 >= 0 { "increment" } else { "decrement" }
    }

    async fn apply(
        &self,
        view: &mut CounterView,
        _message: &InteractiveMessage<CounterView>,
        actor: &str,
    ) -> Result<bool> {
        view.value = view
            .value
            .checked_add(self.0)
            .ok_or_else(|| EngineError::Trigger {
                name: TriggerAction::<CounterView>::name(self),
                reason: format!("counter cannot go past {}", view.value),
            })?;
        view.last_actor = Some(actor.to_string());
        Ok(true)
    }
}

struct Reset;

#[async_trait]
impl TriggerAction<CounterView> for Reset {
    fn name(&self) -> &'static str {
        "reset"
    }

    async fn apply(
        &self,
        view: &mut CounterView,
        _message: &InteractiveMessage<CounterView>,
        actor: &str,
    ) -> Result<bool> {
        if view.value == 0 {
            return Ok(false);
        }
        view.value = 0;
        view.last_actor = Some(actor.to_string());
        Ok(true)
    }
}

/// Shared by every view that offers a close button.
pub(crate) struct Close;

#[async_trait]
impl<V: MessageView> TriggerAction<V> for Close {
    fn name(&self) -> &'static str {
        "close"
    }

    async fn apply(
        &self,
        _view: &mut V,
        message: &InteractiveMessage<V>,
        _actor: &str,
    ) -> Result<bool> {
        message.schedule_destroy(false);
        Ok(false)
    }
}
