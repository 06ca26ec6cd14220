//! Conversation pipeline: the single entry point for new utterances.
//!
//! Admission (busy check, duplicate check, user append, busy flag raised)
//! happens in one turn under the session mutex, which is never held across
//! the backend call. The busy flag is carried by an `InFlight` token that
//! clears it when dropped, so a cancelled request cannot wedge the session.
//!
//! Callers that must not await (the voice bridge, the console) admit with
//! `admit_utterance` in their own turn and spawn only `Admitted::exchange`.

use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use lunatix_core::config::DEFAULT_FALLBACK_MESSAGE;
use lunatix_core::types::Role;

use crate::backend::ChatBackend;
use crate::types::{ChatRequest, ChatSession, Message};

/// Why an utterance was not admitted. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Empty or whitespace-only text.
    Empty,
    /// A backend request for this session is still outstanding.
    Busy,
    /// Identical to the immediately preceding transcript entry.
    Duplicate,
}

/// Result of `ConversationPipeline::submit_utterance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Dropped(DropReason),
    /// The backend answered and its reply was appended.
    Replied,
    /// The backend failed and the fallback message was appended.
    FellBack,
}

#[derive(Debug, Default)]
struct TranscriptState {
    messages: Vec<Message>,
    in_flight: bool,
}

impl TranscriptState {
    fn is_adjacent_duplicate(&self, role: Role, content: &str) -> bool {
        self.messages
            .last()
            .is_some_and(|last| last.is_same_utterance(role, content))
    }
}

/// Single-flight token for the session's outstanding request.
///
/// Generic over how the pipeline is held: borrowed inside
/// `submit_utterance`, shared through `Arc` once admission and exchange
/// run on different tasks.
struct InFlight<P: Deref<Target = ConversationPipeline>> {
    pipeline: P,
    released: bool,
}

impl<P: Deref<Target = ConversationPipeline>> InFlight<P> {
    /// Append the answer and release the session in the same turn.
    fn complete(mut self, reply: Message) {
        let mut state = self.pipeline.lock();
        state.messages.push(reply);
        state.in_flight = false;
        self.pipeline.publish(&state);
        self.released = true;
    }
}

impl<P: Deref<Target = ConversationPipeline>> Drop for InFlight<P> {
    fn drop(&mut self) {
        if !self.released {
            tracing::debug!("Chat request abandoned before completion");
            self.pipeline.lock().in_flight = false;
        }
    }
}

/// A user utterance already appended to the transcript whose backend
/// exchange has not run yet.
///
/// The session stays busy until `exchange` completes or this value is
/// dropped.
pub struct Admitted {
    token: InFlight<Arc<ConversationPipeline>>,
    message: String,
}

impl Admitted {
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Send the utterance to the backend and append the reply or fallback.
    pub async fn exchange(self) -> SubmitOutcome {
        let Admitted { token, message } = self;
        let pipeline = Arc::clone(&token.pipeline);
        pipeline.exchange(token, &message).await
    }
}

impl std::fmt::Debug for Admitted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Admitted")
            .field("message", &self.message)
            .finish()
    }
}

/// Ordered transcript and request discipline for one chat session.
pub struct ConversationPipeline {
    session: ChatSession,
    backend: Arc<dyn ChatBackend>,
    fallback_message: String,
    state: Mutex<TranscriptState>,
    revision: watch::Sender<usize>,
}

impl std::fmt::Debug for ConversationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationPipeline")
            .field("session", &self.session)
            .field("messages", &self.len())
            .field("busy", &self.is_busy())
            .finish()
    }
}

impl ConversationPipeline {
    /// Create a pipeline for a fresh session.
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            session: ChatSession::new(),
            backend,
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            state: Mutex::new(TranscriptState::default()),
            revision,
        }
    }

    pub fn with_session(mut self, session: ChatSession) -> Self {
        self.session = session;
        self
    }

    pub fn with_fallback_message(mut self, message: impl Into<String>) -> Self {
        self.fallback_message = message.into();
        self
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Snapshot of the transcript in append order.
    pub fn transcript(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a backend request is outstanding.
    pub fn is_busy(&self) -> bool {
        self.lock().in_flight
    }

    /// Receiver that sees the transcript length after every append.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.revision.subscribe()
    }

    /// Admit a new user utterance and exchange it with the backend.
    ///
    /// Empty text, a call while another request is outstanding, and a repeat
    /// of the immediately preceding entry are dropped without touching the
    /// transcript. Backend failures are absorbed as the fallback reply.
    pub async fn submit_utterance(&self, text: &str) -> SubmitOutcome {
        let message = text.trim();
        match Self::admit(self, message) {
            Ok(token) => self.exchange(token, message).await,
            Err(reason) => SubmitOutcome::Dropped(reason),
        }
    }

    /// Admit a user utterance without waiting on the backend.
    ///
    /// The same guards as `submit_utterance` run, and on success the user
    /// entry is already in the transcript and the session is busy when this
    /// returns. Utterances admitted this way keep the order of the calls.
    pub fn admit_utterance(self: &Arc<Self>, text: &str) -> Result<Admitted, DropReason> {
        let message = text.trim();
        let token = Self::admit(Arc::clone(self), message)?;
        Ok(Admitted {
            token,
            message: message.to_string(),
        })
    }

    /// Append an assistant-side note outside the request/response cycle.
    ///
    /// Returns `false` if the note was empty or repeats the last entry.
    pub fn append_assistant_note(&self, text: &str) -> bool {
        let note = text.trim();
        if note.is_empty() {
            return false;
        }
        let mut state = self.lock();
        if state.is_adjacent_duplicate(Role::Assistant, note) {
            tracing::debug!("Duplicate assistant note dropped");
            return false;
        }
        state.messages.push(Message::assistant(note, vec![]));
        self.publish(&state);
        true
    }

    fn admit<P>(pipeline: P, message: &str) -> Result<InFlight<P>, DropReason>
    where
        P: Deref<Target = ConversationPipeline>,
    {
        let admitted = pipeline.try_admit(message);
        if let Err(reason) = admitted {
            tracing::debug!(
                session_id = %pipeline.session.session_id,
                ?reason,
                "Utterance dropped"
            );
            return Err(reason);
        }
        Ok(InFlight {
            pipeline,
            released: false,
        })
    }

    /// Guards plus user append, in one turn under the session mutex.
    fn try_admit(&self, message: &str) -> Result<(), DropReason> {
        if message.is_empty() {
            return Err(DropReason::Empty);
        }
        let mut state = self.lock();
        if state.in_flight {
            return Err(DropReason::Busy);
        }
        if state.is_adjacent_duplicate(Role::User, message) {
            return Err(DropReason::Duplicate);
        }
        state.messages.push(Message::user(message));
        state.in_flight = true;
        self.publish(&state);
        Ok(())
    }

    async fn exchange<P>(&self, token: InFlight<P>, message: &str) -> SubmitOutcome
    where
        P: Deref<Target = ConversationPipeline>,
    {
        let request = ChatRequest {
            session_id: self.session.session_id.clone(),
            message: message.to_string(),
        };

        match self.backend.send(&request).await {
            Ok(reply) => {
                tracing::info!(
                    session_id = %self.session.session_id,
                    sources = reply.sources.len(),
                    "Chat reply received"
                );
                token.complete(Message::assistant(reply.reply, reply.sources));
                SubmitOutcome::Replied
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %self.session.session_id,
                    error = %e,
                    "Chat request failed"
                );
                token.complete(Message::assistant(self.fallback_message.clone(), vec![]));
                SubmitOutcome::FellBack
            }
        }
    }

    fn publish(&self, state: &TranscriptState) {
        self.revision.send_replace(state.messages.len());
    }

    fn lock(&self) -> MutexGuard<'_, TranscriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Tests
// =============================================================================
