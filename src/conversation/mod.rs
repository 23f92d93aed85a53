//! Conversation types and history assembly

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One role-tagged turn in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Rendering hint; translations are shown under their source reply
    #[serde(default, skip_serializing_if = "TurnKind::is_reply")]
    pub kind: TurnKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    #[default]
    Reply,
    Translation,
}

impl TurnKind {
    fn is_reply(&self) -> bool {
        matches!(self, TurnKind::Reply)
    }
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            kind: TurnKind::Reply,
        }
    }
}

/// Returned when a translation would not directly follow its source reply
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("translation must directly follow an assistant reply")]
pub struct OrphanTranslation;

/// Ordered turn history owned by a single session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    pub fn add_user(&mut self, content: &str) {
        self.messages.push(Message::user(content));
    }

    pub fn add_assistant(&mut self, content: &str) {
        self.messages.push(Message::assistant(content));
    }

    /// Append a translation of the reply that was just recorded.
    pub fn add_translation(&mut self, content: &str) -> Result<(), OrphanTranslation> {
        match self.messages.last() {
            Some(last) if last.role == Role::Assistant && last.kind == TurnKind::Reply => {
                self.messages.push(Message {
                    role: Role::Assistant,
                    content: content.to_string(),
                    kind: TurnKind::Translation,
                });
                Ok(())
            }
            _ => Err(OrphanTranslation),
        }
    }

    /// Drop every turn. There is no partial deletion.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// User and assistant turns with content, in their original order.
///
/// System turns are left out. Applying this to its own output yields the
/// same sequence.
pub fn prepare_history(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .filter(|m| !m.content.trim().is_empty())
        .cloned()
        .collect()
}
