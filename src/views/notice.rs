//! A one-off notice: published once, never interactive.

use async_trait::async_trait;

use crate::engine::{InteractiveMessage, MessageView, RenderResult};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct NoticeView {
    text: String,
}

impl NoticeView {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl MessageView for NoticeView {
    const KIND: &'static str = "notice";

    async fn render(&mut self, _message: &InteractiveMessage<Self>) -> Result<RenderResult> {
        Ok(RenderResult::text(&self.text))
    }

    fn render_once(&self) -> bool {
        true
    }
}
