//! Paginated list with a jump-to-page prompt.

use async_trait::async_trait;

use crate::engine::{
    Embed, InteractiveMessage, MessageView, RenderResult, TriggerAction, TriggerSpec,
};
use crate::error::Result;
use crate::views::counter::Close;

pub const PREVIOUS: &str = "◀";
pub const NEXT: &str = "▶";
pub const JUMP: &str = "🔢";
pub const CLOSE: &str = "❌";

#[derive(Debug, Clone)]
pub struct PagerView {
    title: String,
    items: Vec<String>,
    per_page: usize,
    page: usize,
}

impl PagerView {
    pub fn new(title: impl Into<String>, items: Vec<String>, per_page: usize) -> Self {
        Self {
            title: title.into(),
            items,
            per_page: per_page.max(1),
            page: 0,
        }
    }

    /// Zero-based current page.
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.items.len().div_ceil(self.per_page).max(1)
    }

    fn set_page(&mut self, page: usize) -> bool {
        let page = page.min(self.page_count() - 1);
        if page == self.page {
            return false;
        }
        self.page = page;
        true
    }
}

#[async_trait]
impl MessageView for PagerView {
    const KIND: &'static str = "pager";

    async fn render(&mut self, _message: &InteractiveMessage<Self>) -> Result<RenderResult> {
        if self.items.is_empty() {
            return Ok(RenderResult::text(format!("{}: nothing to show", self.title)));
        }
        let start = self.page * self.per_page;
        let end = (start + self.per_page).min(self.items.len());
        let mut embed = Embed::new().with_title(&self.title);
        for (i, item) in self.items[start..end].iter().enumerate() {
            embed = embed.with_field(format!("#{}", start + i + 1), item, false);
        }
        embed = embed.with_footer(format!("Page {}/{}", self.page + 1, self.page_count()));
        Ok(RenderResult::embed(embed))
    }

    fn create_triggers(&self) -> Vec<TriggerSpec<Self>> {
        if self.page_count() <= 1 {
            return vec![TriggerSpec::new(CLOSE, Close)];
        }
        vec![
            TriggerSpec::new(PREVIOUS, Turn::Previous),
            TriggerSpec::new(NEXT, Turn::Next),
            TriggerSpec::new(JUMP, Jump),
            TriggerSpec::new(CLOSE, Close),
        ]
    }
}

enum Turn {
    Previous,
    Next,
}

#[async_trait]
impl TriggerAction<PagerView> for Turn {
    fn name(&self) -> &'static str {
        match self {
            Turn::Previous => "previous_page",
            Turn::Next => "next_page",
        }
    }

    async fn apply(
        &self,
        view: &mut PagerView,
        _message: &InteractiveMessage<PagerView>,
        _actor: &str,
    ) -> Result<bool> {
        let target = match self {
            Turn::Previous => view.page.saturating_sub(1),
            Turn::Next => view.page + 1,
        };
        Ok(view.set_page(target))
    }
}

/// Ask for a page number and go there.
struct Jump;

#[async_trait]
impl TriggerAction<PagerView> for Jump {
    fn name(&self) -> &'static str {
        "jump_to_page"
    }

    async fn apply(
        &self,
        view: &mut PagerView,
        message: &InteractiveMessage<PagerView>,
        _actor: &str,
    ) -> Result<bool> {
        let prompt = format!("Which page? (1-{})", view.page_count());
        let Some(answer) = message.wait_input(&prompt, None).await else {
            return Ok(false);
        };
        match answer.trim().parse::<usize>() {
            Ok(n) if n >= 1 => Ok(view.set_page(n - 1)),
            _ => {
                tracing::debug!(answer = %answer, "Ignoring invalid page number");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("Item {}", i)).collect()
    }

    #[test]
    fn test_page_count() {
        assert_eq!(PagerView::new("t", items(0), 5).page_count(), 1);
        assert_eq!(PagerView::new("t", items(5), 5).page_count(), 1);
        assert_eq!(PagerView::new("t", items(6), 5).page_count(), 2);
        assert_eq!(PagerView::new("t", items(3), 0).page_count(), 3);
    }

    #[test]
    fn test_set_page_clamps() {
        let mut view = PagerView::new("t", items(12), 5);
        assert!(view.set_page(10));
        assert_eq!(view.page(), 2);
        assert!(!view.set_page(2));
        assert!(view.set_page(0));
    }

    #[test]
    fn test_single_page_only_closes() {
        let view = PagerView::new("t", items(2), 5);
        let triggers = view.create_triggers();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].emoji, CLOSE);
    }
}
