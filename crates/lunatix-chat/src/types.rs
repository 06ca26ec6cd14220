//! Transcript entries, sessions, and chat backend payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lunatix_core::types::Role;

/// One conversation with the chat backend.
///
/// The id is generated once and sent with every request so the backend can
/// keep its own context for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            started_at: Utc::now(),
        }
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// A transcript entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Citation labels, only ever set on assistant replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: None,
            created_at: Utc::now(),
        }
    }

    /// Assistant entry; an empty source list is stored as `None`.
    pub fn assistant(content: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources: if sources.is_empty() {
                None
            } else {
                Some(sources)
            },
            created_at: Utc::now(),
        }
    }

    /// Same author and text, ignoring sources and timestamps.
    pub fn is_same_utterance(&self, role: Role, content: &str) -> bool {
        self.role == role && self.content == content
    }
}

/// Request body sent to the chat backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

/// What the pipeline needs back from a successful chat call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
    pub reply: String,
    pub sources: Vec<String>,
}

/// A citation returned by the chatbot API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSource {
    pub label: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Response body of `POST {prefix}/chatbot/chat`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatResponseBody {
    #[serde(default)]
    pub session_id: Option<String>,
    pub response: String,
    #[serde(default)]
    pub sources: Vec<ChatSource>,
}

impl From<ChatResponseBody> for ChatReply {
    fn from(body: ChatResponseBody) -> Self {
        ChatReply {
            reply: body.response,
            sources: body.sources.into_iter().map(|s| s.label).collect(),
        }
    }
}
