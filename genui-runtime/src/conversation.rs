use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const GREETING: &str =
    "GenUI Studio is ready. Describe a UI component, dashboard, or layout to generate it instantly.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(rename = "uiNode", default, skip_serializing_if = "Option::is_none")]
    pub ui_node: Option<Arc<Value>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            ui_node: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            ui_node: None,
        }
    }

    pub fn assistant(content: impl Into<String>, tree: Value) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            ui_node: Some(Arc::new(tree)),
        }
    }
}

/// One history snapshot: the message log plus an explicit pointer to the
/// message holding the active tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
    active: Option<usize>,
    /// Partial tree of the generation currently streaming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preview: Option<Arc<Value>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn greeting() -> Self {
        Self::new().with_message(Message::system(GREETING))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_tree(&self) -> Option<&Arc<Value>> {
        self.active
            .and_then(|i| self.messages.get(i))
            .and_then(|m| m.ui_node.as_ref())
    }

    pub fn preview(&self) -> Option<&Arc<Value>> {
        self.preview.as_ref()
    }

    /// Append a message; a tree-bearing message becomes the active one.
    pub fn with_message(&self, message: Message) -> Self {
        let mut next = self.clone();
        if message.ui_node.is_some() {
            next.active = Some(next.messages.len());
        }
        next.messages.push(message);
        next
    }

    pub fn with_messages(&self, messages: impl IntoIterator<Item = Message>) -> Self {
        messages
            .into_iter()
            .fold(self.clone(), |conversation, message| conversation.with_message(message))
    }

    /// Replace the active tree in place. `None` when there is no active tree.
    pub fn with_active_tree(&self, tree: Value) -> Option<Self> {
        let index = self.active?;
        let mut next = self.clone();
        let message = next.messages.get_mut(index)?;
        message.ui_node = Some(Arc::new(tree));
        Some(next)
    }

    pub fn with_preview(&self, preview: Option<Arc<Value>>) -> Self {
        let mut next = self.clone();
        next.preview = preview;
        next
    }
}
