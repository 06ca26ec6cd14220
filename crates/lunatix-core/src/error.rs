use thiserror::Error;

/// Top-level error type for the LunatiX assistant.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for LunatixError` so that the `?` operator works
/// across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LunatixError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Voice error: {0}")]
    Voice(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for LunatixError {
    fn from(err: toml::de::Error) -> Self {
        LunatixError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for LunatixError {
    fn from(err: toml::ser::Error) -> Self {
        LunatixError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for LunatixError {
    fn from(err: serde_json::Error) -> Self {
        LunatixError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for LunatiX operations.
pub type Result<T> = std::result::Result<T, LunatixError>;
