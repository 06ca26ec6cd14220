//! Error types for speech recognition.

use lunatix_core::error::LunatixError;

/// Errors raised by a speech recognizer or its session handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    #[error("speech recognition is not supported on this host")]
    Unavailable,
    #[error("failed to create recognition session: {0}")]
    Create(String),
    #[error("failed to start recognition: {0}")]
    Start(String),
    #[error("speech recognition error: {0}")]
    Platform(String),
}

impl From<VoiceError> for LunatixError {
    fn from(err: VoiceError) -> Self {
        LunatixError::Voice(err.to_string())
    }
}
