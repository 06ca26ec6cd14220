//! Conversation pipeline for the LunatiX claims assistant.
//!
//! Owns the ordered transcript of one chat session, admits utterances from
//! typed input and voice transcription through a single entry point, and
//! keeps at most one chat backend request in flight at a time.

pub mod backend;
pub mod error;
pub mod pipeline;
pub mod sink;
pub mod types;

pub use backend::{ChatBackend, HttpChatBackend};
pub use error::ChatError;
pub use pipeline::{Admitted, ConversationPipeline, DropReason, SubmitOutcome};
pub use sink::PipelineSink;
pub use types::{ChatReply, ChatRequest, ChatSession, ChatSource, Message};
