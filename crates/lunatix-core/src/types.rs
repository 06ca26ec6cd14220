use std::fmt;

use serde::{Deserialize, Serialize};

/// Author of a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Typed or spoken input from the person using the assistant.
    User,
    /// Replies from the chat backend and assistant-side notes.
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Receiver for finalized speech transcriptions.
///
/// The voice controller hands every finalized, trimmed, non-empty utterance
/// to a sink and never touches the chat transcript itself. Implementations
/// must not block: the controller calls this from its signal handler.
pub trait TranscriptionSink: Send + Sync {
    fn on_transcription(&self, role: Role, text: String);
}
