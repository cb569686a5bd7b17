//! Conversation state shared by the dispatcher and the renderer
//!
//! The conversation is append-only: messages are never edited or removed, and
//! insertion order is display order.

use serde::{Deserialize, Serialize};

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    /// Local failure record, never produced by the API
    Error,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Model => "Gemini",
            Role::Error => "Error",
        }
    }
}

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { role: Role::Error, text: text.into() }
    }

    /// Wire form: `{ role, parts: [{ text }] }`
    pub fn to_content(&self) -> Content {
        Content {
            role: Some(self.role),
            parts: vec![Part { text: Some(self.text.clone()) }],
        }
    }
}

/// A fragment of message content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One turn of the conversation as the API sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Ordered, append-only message log for one session
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Snapshot of every entry in wire form, error records included
    pub fn to_contents(&self) -> Vec<Content> {
        self.messages.iter().map(Message::to_content).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_insertion_order() {
        let mut conversation = Conversation::new();
        conversation.append(Message::user("one"));
        conversation.append(Message::model("two"));
        conversation.append(Message::error("three"));

        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::Error]);
        assert_eq!(conversation.last().map(|m| m.text.as_str()), Some("three"));
    }

    #[test]
    fn content_serializes_to_api_shape() {
        let json = serde_json::to_value(Message::model("hello").to_content()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "role": "model", "parts": [{ "text": "hello" }] })
        );
    }

    #[test]
    fn error_records_keep_their_role_on_the_wire() {
        let mut conversation = Conversation::new();
        conversation.append(Message::user("hi"));
        conversation.append(Message::error("Error: boom. Please try again."));

        let contents = conversation.to_contents();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[1].role, Some(Role::Error));
    }
}
