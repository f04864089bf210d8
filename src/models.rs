use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted request/response turn, as returned by the history API.
/// Only the boundary decode in [`crate::api`] constructs these; everything
/// past that boundary can rely on the fields being present and well-formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: i64,
    /// Groups entries into a thread. Absent on legacy records, which are
    /// kept at this layer and excluded from grouping by the reconciler.
    pub conversation_id: Option<String>,
    pub input: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Model => "model",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single rendered chat message. Derived state: ids are regenerated every
/// time a thread is rebuilt from log entries, so they are only meaningful
/// within one rebuild (and as the correlation id of a pending send).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            timestamp,
        }
    }
}

/// An ordered thread of messages grouped by conversation id. Derived state:
/// discarded and rebuilt whenever the entry list changes, never patched
/// field-by-field.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    /// Last-activity time: the max timestamp across the constituent entries.
    pub timestamp: DateTime<Utc>,
    /// Ids of the entries composing this thread, in append order. Deleting
    /// the conversation means deleting each of these against the store.
    pub source_ids: Vec<i64>,
}

/// Outcome of resolving which conversation the UI should present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveSelection {
    /// A conversation from the reconciled set, with its position in the
    /// descending-ordered list.
    Selected { id: String, index: usize },
    /// No conversation active: the state preceding the user's first message.
    Empty,
}

impl ActiveSelection {
    pub fn id(&self) -> Option<&str> {
        match self {
            ActiveSelection::Selected { id, .. } => Some(id),
            ActiveSelection::Empty => None,
        }
    }
}

/// A server-confirmed chat turn: the model's reply plus the id of the
/// entry the backend persisted for it, when the backend reports one.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub reply: String,
    pub entry_id: Option<i64>,
}

/// Result of a completed send, handed to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    pub conversation_id: String,
    pub reply: Message,
}
