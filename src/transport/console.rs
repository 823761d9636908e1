//! Console transport for the demo REPL.
//!
//! Bot messages are printed to stdout with their id; stdin lines become
//! incoming events:
//!
//! ```text
//! /react m3 ▶️      reaction on message m3
//! /quit             end of input
//! anything else     text reply in the console channel
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use futures::future::ready;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;

use crate::engine::RenderResult;
use crate::error::TransportError;
use crate::transport::{
    EventStream, IncomingEvent, IncomingReply, MessageId, ReactionEvent, SentMessage, Transport,
};

/// A parsed line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    React { message_id: MessageId, emoji: String },
    Reply { content: String },
    Quit,
    Empty,
}

/// Parse one line typed at the console.
pub fn parse_console_line(line: &str) -> ConsoleInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ConsoleInput::Empty;
    }
    let lower = trimmed.to_lowercase();
    if lower == "/quit" || lower == "/exit" {
        return ConsoleInput::Quit;
    }
    if let Some(rest) = trimmed.strip_prefix("/react ") {
        let mut parts = rest.split_whitespace();
        if let (Some(id), Some(emoji)) = (parts.next(), parts.next()) {
            return ConsoleInput::React {
                message_id: MessageId::from(id),
                emoji: emoji.to_string(),
            };
        }
    }
    ConsoleInput::Reply {
        content: trimmed.to_string(),
    }
}

/// Transport that talks to a terminal.
pub struct ConsoleTransport {
    channel_id: String,
    user_id: String,
    next_id: AtomicU64,
    live: Mutex<HashMap<MessageId, String>>,
}

impl ConsoleTransport {
    pub fn new(channel_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            next_id: AtomicU64::new(1),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Turn stdin into an event stream. The stream ends on `/quit` or EOF.
    pub fn events(self: &Arc<Self>) -> EventStream {
        let this = Arc::clone(self);
        let lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
        let stream = lines
            .take_while(|line| ready(line.is_ok()))
            .filter_map(|line| ready(line.ok()))
            .map(move |line| this.to_event(&line))
            .take_while(|event| ready(event.is_some()))
            .filter_map(|event| ready(event.flatten()));
        Box::pin(stream)
    }

    /// `None` ends the stream, `Some(None)` skips the line.
    fn to_event(&self, line: &str) -> Option<Option<IncomingEvent>> {
        match parse_console_line(line) {
            ConsoleInput::Quit => None,
            ConsoleInput::Empty => Some(None),
            ConsoleInput::React { message_id, emoji } => {
                Some(Some(IncomingEvent::ReactionAdded(ReactionEvent {
                    message_id,
                    channel_id: self.channel_id.clone(),
                    user_id: self.user_id.clone(),
                    emoji,
                    from_self: false,
                })))
            }
            ConsoleInput::Reply { content } => {
                let message_id = self.allocate_id("u");
                self.live_map().insert(message_id.clone(), content.clone());
                Some(Some(IncomingEvent::TextReply(IncomingReply {
                    message_id,
                    channel_id: self.channel_id.clone(),
                    user_id: self.user_id.clone(),
                    content,
                })))
            }
        }
    }

    fn allocate_id(&self, prefix: &str) -> MessageId {
        MessageId(format!(
            "{}{}",
            prefix,
            self.next_id.fetch_add(1, Ordering::Relaxed)
        ))
    }

    fn live_map(&self) -> std::sync::MutexGuard<'_, HashMap<MessageId, String>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    async fn send_message(
        &self,
        channel_id: &str,
        content: &RenderResult,
    ) -> Result<SentMessage, TransportError> {
        let id = self.allocate_id("m");
        let text = content.to_plain_text();
        println!("[{}] {}", id, text);
        self.live_map().insert(id.clone(), text);
        Ok(SentMessage {
            id,
            channel_id: channel_id.to_string(),
            editable: true,
            sent_at: Utc::now(),
        })
    }

    async fn edit_message(
        &self,
        message: &SentMessage,
        content: &RenderResult,
    ) -> Result<SentMessage, TransportError> {
        let text = content.to_plain_text();
        let mut live = self.live_map();
        match live.get_mut(&message.id) {
            Some(slot) => {
                println!("[{} edited] {}", message.id, text);
                *slot = text;
                Ok(message.clone())
            }
            None => Err(TransportError::UnknownMessage {
                id: message.id.clone(),
            }),
        }
    }

    async fn delete_message(
        &self,
        _channel_id: &str,
        id: &MessageId,
    ) -> Result<(), TransportError> {
        match self.live_map().remove(id) {
            Some(_) => {
                println!("[{} deleted]", id);
                Ok(())
            }
            None => Err(TransportError::UnknownMessage { id: id.clone() }),
        }
    }

    async fn add_reaction(
        &self,
        message: &SentMessage,
        emoji: &str,
    ) -> Result<(), TransportError> {
        if !self.live_map().contains_key(&message.id) {
            return Err(TransportError::UnknownMessage {
                id: message.id.clone(),
            });
        }
        println!("[{} +{}]", message.id, emoji);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_console_line() {
        assert_eq!(parse_console_line("   "), ConsoleInput::Empty);
        assert_eq!(parse_console_line("/QUIT"), ConsoleInput::Quit);
        assert_eq!(
            parse_console_line("/react m3 ▶"),
            ConsoleInput::React {
                message_id: MessageId::from("m3"),
                emoji: "▶".to_string()
            }
        );
        assert_eq!(
            parse_console_line(" 42 "),
            ConsoleInput::Reply {
                content: "42".to_string()
            }
        );
        // Missing emoji falls through to a plain reply
        assert_eq!(
            parse_console_line("/react m3"),
            ConsoleInput::Reply {
                content: "/react m3".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_reply_lines_become_deletable_messages() {
        let transport = ConsoleTransport::new("console", "local");
        let event = transport.to_event("hello").flatten().unwrap();
        let IncomingEvent::TextReply(reply) = event else {
            panic!("expected a text reply");
        };
        assert_eq!(reply.content, "hello");
        transport
            .delete_message("console", &reply.message_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_edit_unknown_message_fails() {
        let transport = ConsoleTransport::new("console", "local");
        let sent = transport
            .send_message("console", &RenderResult::text("a"))
            .await
            .unwrap();
        transport.delete_message("console", &sent.id).await.unwrap();
        let err = transport
            .edit_message(&sent, &RenderResult::text("b"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownMessage { .. }));
    }
}
