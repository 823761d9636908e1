//! Render results produced by interactive message views.

use serde::{Deserialize, Serialize};

/// A single name/value row in an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// Rich content attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_field(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        inline: bool,
    ) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    /// True when the embed would show nothing.
    pub fn is_empty(&self) -> bool {
        self.title.as_deref().is_none_or(str::is_empty)
            && self.description.as_deref().is_none_or(str::is_empty)
            && self.fields.is_empty()
            && self.footer.as_deref().is_none_or(str::is_empty)
    }
}

/// Content produced by one render pass.
///
/// Two results are the same render iff they compare equal; the engine uses
/// this to skip edits that would not change what is on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResult {
    pub text: Option<String>,
    pub embed: Option<Embed>,
}

impl RenderResult {
    /// A result that renders nothing. `update()` treats it as "no change".
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            embed: None,
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            text: None,
            embed: Some(embed),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embed = Some(embed);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(str::is_empty)
            && self.embed.as_ref().is_none_or(Embed::is_empty)
    }

    /// Plain-text rendering, used by text-only transports.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            out.push_str(text);
        }
        if let Some(embed) = self.embed.as_ref().filter(|e| !e.is_empty()) {
            let mut push_line = |line: &str| {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(line);
            };
            if let Some(title) = &embed.title {
                push_line(&format!("== {} ==", title));
            }
            if let Some(description) = &embed.description {
                push_line(description);
            }
            for field in &embed.fields {
                push_line(&format!("{}: {}", field.name, field.value));
            }
            if let Some(footer) = &embed.footer {
                push_line(&format!("-- {}", footer));
            }
        }
        out
    }
}
