//! Error types for chat backend calls.

use lunatix_core::error::LunatixError;

/// Errors from a chat backend call.
///
/// The pipeline treats every variant the same way: the failure is absorbed
/// into the transcript as the fallback assistant message.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Transport(String),
    #[error("chat backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed chat response: {0}")]
    MalformedPayload(String),
}

impl From<ChatError> for LunatixError {
    fn from(err: ChatError) -> Self {
        LunatixError::Chat(err.to_string())
    }
}
