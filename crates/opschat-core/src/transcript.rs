//! Session-scoped list of displayed chat messages.

use chrono::{DateTime, Local};

use crate::render::{render, Markup};

/// Who authored a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Agent,
}

impl Sender {
    pub fn display_name(&self) -> &'static str {
        match self {
            Sender::User => "You",
            Sender::Agent => "Agent",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: u64,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Local>,
    /// Rendered form of `text`
    pub markup: Markup,
    /// Transient "agent is typing" placeholder
    pub typing: bool,
}

#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, rendering its text. Returns the message id.
    pub fn push(&mut self, sender: Sender, text: impl Into<String>) -> u64 {
        let text = text.into();
        let markup = render(&text);
        self.append(sender, text, markup, false)
    }

    pub fn push_typing(&mut self) -> u64 {
        self.append(Sender::Agent, String::new(), Markup::default(), true)
    }

    /// Remove a typing placeholder. Real messages are never removed.
    pub fn remove_typing(&mut self, id: u64) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| !(m.typing && m.id == id));
        self.messages.len() != before
    }

    fn append(&mut self, sender: Sender, text: String, markup: Markup, typing: bool) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            text,
            sender,
            timestamp: Local::now(),
            markup,
            typing,
        });
        id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_typing(&self) -> bool {
        self.messages.iter().any(|m| m.typing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let mut transcript = Transcript::new();
        let a = transcript.push(Sender::User, "hello");
        let b = transcript.push_typing();
        let c = transcript.push(Sender::Agent, "hi");
        assert!(a < b && b < c);
        assert_eq!(transcript.len(), 3);
    }

    #[test]
    fn test_remove_typing_only_removes_placeholders() {
        let mut transcript = Transcript::new();
        let user = transcript.push(Sender::User, "hello");
        let typing = transcript.push_typing();

        assert!(!transcript.remove_typing(user));
        assert!(transcript.has_typing());
        assert!(transcript.remove_typing(typing));
        assert!(!transcript.has_typing());
        assert!(!transcript.remove_typing(typing));
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn test_push_renders_markup() {
        let mut transcript = Transcript::new();
        transcript.push(Sender::Agent, "- one\n- two");
        let message = transcript.last().unwrap();
        assert_eq!(message.markup, render("- one\n- two"));
        assert!(!message.typing);
    }
}
