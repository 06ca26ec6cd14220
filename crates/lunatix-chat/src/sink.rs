//! Bridge from voice transcription into the conversation pipeline.

use std::sync::Arc;

use tokio::runtime::Handle;

use lunatix_core::types::{Role, TranscriptionSink};

use crate::pipeline::ConversationPipeline;

/// Feeds recognized speech into a `ConversationPipeline`.
///
/// User utterances are admitted in the caller's turn, so the transcript
/// follows the order the recognizer delivered them in. Only the backend
/// exchange runs on a spawned task, and the voice controller's signal
/// handler never waits on the chat backend. Assistant-side text is appended
/// as a note.
#[derive(Debug, Clone)]
pub struct PipelineSink {
    pipeline: Arc<ConversationPipeline>,
    runtime: Handle,
}

impl PipelineSink {
    /// Create a sink that spawns onto the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(pipeline: Arc<ConversationPipeline>) -> Self {
        Self::with_runtime(pipeline, Handle::current())
    }

    pub fn with_runtime(pipeline: Arc<ConversationPipeline>, runtime: Handle) -> Self {
        Self { pipeline, runtime }
    }
}

impl TranscriptionSink for PipelineSink {
    fn on_transcription(&self, role: Role, text: String) {
        match role {
            Role::User => {
                let Ok(admitted) = self.pipeline.admit_utterance(&text) else {
                    return;
                };
                self.runtime.spawn(async move {
                    let outcome = admitted.exchange().await;
                    tracing::debug!(?outcome, "Voice utterance answered");
                });
            }
            Role::Assistant => {
                self.pipeline.append_assistant_note(&text);
            }
        }
    }
}
