//! Host speech-recognition abstraction.
//!
//! A `SpeechRecognizer` creates `RecognitionHandle`s. Each handle reports
//! back through the `SignalEmitter` it was created with; the emitter is tagged
//! with the handle's generation and can be detached by the controller, after
//! which every signal it emits is dropped at the source.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::VoiceError;

/// One candidate transcription within a recognition result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionAlternative {
    pub transcript: String,
    /// Interim (partial) results have this set to `false`.
    pub is_final: bool,
}

impl RecognitionAlternative {
    pub fn finalized(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
        }
    }

    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
        }
    }
}

/// Asynchronous signals a recognition handle emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionSignal {
    /// The platform acknowledged the start request and is capturing.
    Started,
    /// One or more results, finalized or interim.
    Result(Vec<RecognitionAlternative>),
    /// The platform session ended, whether or not anyone asked it to.
    Ended,
    /// The platform failed, with an optional reason.
    Error(Option<String>),
}

/// A signal tagged with the generation of the handle that produced it.
#[derive(Debug)]
pub(crate) struct TaggedSignal {
    pub(crate) generation: u64,
    pub(crate) signal: RecognitionSignal,
}

/// Callback channel handed to a recognition handle at creation.
#[derive(Debug, Clone)]
pub struct SignalEmitter {
    generation: u64,
    attached: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<TaggedSignal>,
}

impl SignalEmitter {
    pub(crate) fn new(
        generation: u64,
        attached: Arc<AtomicBool>,
        tx: mpsc::UnboundedSender<TaggedSignal>,
    ) -> Self {
        Self {
            generation,
            attached,
            tx,
        }
    }

    /// Queue a signal for the controller.
    ///
    /// Returns `false` if the emitter was detached or the controller is gone.
    pub fn emit(&self, signal: RecognitionSignal) -> bool {
        if !self.is_attached() {
            tracing::trace!(
                generation = self.generation,
                ?signal,
                "Dropping signal from detached recognition handle"
            );
            return false;
        }
        self.tx
            .send(TaggedSignal {
                generation: self.generation,
                signal,
            })
            .is_ok()
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Host speech-recognition capability.
pub trait SpeechRecognizer: Send + Sync {
    /// Whether the host can recognize speech at all.
    fn is_available(&self) -> bool;

    /// Create a new recognition handle reporting through `emitter`.
    fn create(&self, emitter: SignalEmitter) -> Result<Box<dyn RecognitionHandle>, VoiceError>;
}

/// One platform recognition session.
///
/// `start` may be called again after the handle emitted `Ended`.
pub trait RecognitionHandle: Send {
    fn start(&mut self) -> Result<(), VoiceError>;
    fn stop(&mut self);
}

// =============================================================================
// Unavailable recognizer
// =============================================================================

/// Recognizer for hosts without speech capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRecognizer;

impl SpeechRecognizer for UnavailableRecognizer {
    fn is_available(&self) -> bool {
        false
    }

    fn create(&self, _emitter: SignalEmitter) -> Result<Box<dyn RecognitionHandle>, VoiceError> {
        Err(VoiceError::Unavailable)
    }
}

// =============================================================================
// Scripted recognizer
// =============================================================================

/// Recognizer that replays a fixed list of utterances.
///
/// Each platform session acknowledges the start, delivers up to
/// `utterances_per_session` finalized results (each preceded by an interim
/// partial when `interim_results` is set) and then ends on its own if more
/// lines remain, the way a real recognizer ends after a silence timeout.
/// Once the script is exhausted the session stays open and silent.
///
/// With a non-zero utterance pause, results are delivered from a tokio task
/// with that much silence before each one; otherwise the whole session is
/// delivered from `start`.
#[derive(Debug, Clone)]
pub struct ScriptedRecognizer {
    lines: Arc<Mutex<VecDeque<String>>>,
    utterances_per_session: usize,
    interim_results: bool,
    utterance_pause: Duration,
}

impl ScriptedRecognizer {
    pub fn new<I, S>(lines: I, utterances_per_session: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: Arc::new(Mutex::new(lines.into_iter().map(Into::into).collect())),
            utterances_per_session: utterances_per_session.max(1),
            interim_results: true,
            utterance_pause: Duration::ZERO,
        }
    }

    pub fn with_interim_results(mut self, interim_results: bool) -> Self {
        self.interim_results = interim_results;
        self
    }

    pub fn with_utterance_pause(mut self, pause: Duration) -> Self {
        self.utterance_pause = pause;
        self
    }

    /// Lines not yet delivered.
    pub fn remaining(&self) -> usize {
        self.lines.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn is_available(&self) -> bool {
        true
    }

    fn create(&self, emitter: SignalEmitter) -> Result<Box<dyn RecognitionHandle>, VoiceError> {
        Ok(Box::new(ScriptedHandle {
            script: Script {
                lines: Arc::clone(&self.lines),
                utterances_per_session: self.utterances_per_session,
                interim_results: self.interim_results,
            },
            utterance_pause: self.utterance_pause,
            emitter,
            running: Arc::new(AtomicBool::new(false)),
            pacer: None,
        }))
    }
}

#[derive(Clone)]
struct Script {
    lines: Arc<Mutex<VecDeque<String>>>,
    utterances_per_session: usize,
    interim_results: bool,
}

impl Script {
    /// Emit the next line, returning `false` once the script is exhausted.
    fn deliver_next(&self, emitter: &SignalEmitter) -> bool {
        let Some(line) = self.lines().pop_front() else {
            return false;
        };
        if self.interim_results {
            if let Some(partial) = interim_prefix(&line) {
                emitter.emit(RecognitionSignal::Result(vec![
                    RecognitionAlternative::interim(partial),
                ]));
            }
        }
        emitter.emit(RecognitionSignal::Result(vec![
            RecognitionAlternative::finalized(line),
        ]));
        true
    }

    fn has_more(&self) -> bool {
        !self.lines().is_empty()
    }

    fn lines(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// End the session on its own if the script has more to say.
fn finish_session(script: &Script, running: &AtomicBool, emitter: &SignalEmitter) {
    if script.has_more() {
        // Cleared before `Ended` so the controller's restart is accepted.
        running.store(false, Ordering::Release);
        emitter.emit(RecognitionSignal::Ended);
    }
}

struct ScriptedHandle {
    script: Script,
    utterance_pause: Duration,
    emitter: SignalEmitter,
    running: Arc<AtomicBool>,
    pacer: Option<JoinHandle<()>>,
}

impl ScriptedHandle {
    fn cancel_pacer(&mut self) {
        if let Some(pacer) = self.pacer.take() {
            pacer.abort();
        }
    }
}

impl RecognitionHandle for ScriptedHandle {
    fn start(&mut self) -> Result<(), VoiceError> {
        if self.running.load(Ordering::Acquire) {
            return Err(VoiceError::Start("recognition already started".to_string()));
        }

        if self.utterance_pause.is_zero() {
            self.running.store(true, Ordering::Release);
            self.emitter.emit(RecognitionSignal::Started);
            for _ in 0..self.script.utterances_per_session {
                if !self.script.deliver_next(&self.emitter) {
                    break;
                }
            }
            finish_session(&self.script, &self.running, &self.emitter);
            return Ok(());
        }

        let runtime = Handle::try_current()
            .map_err(|e| VoiceError::Start(format!("no async runtime for paced script: {}", e)))?;
        self.cancel_pacer();
        self.running.store(true, Ordering::Release);
        self.emitter.emit(RecognitionSignal::Started);

        let script = self.script.clone();
        let emitter = self.emitter.clone();
        let running = Arc::clone(&self.running);
        let pause = self.utterance_pause;
        self.pacer = Some(runtime.spawn(async move {
            for _ in 0..script.utterances_per_session {
                tokio::time::sleep(pause).await;
                if !script.deliver_next(&emitter) {
                    break;
                }
            }
            finish_session(&script, &running, &emitter);
        }));
        Ok(())
    }

    fn stop(&mut self) {
        self.cancel_pacer();
        if self.running.swap(false, Ordering::AcqRel) {
            self.emitter.emit(RecognitionSignal::Ended);
        }
    }
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.cancel_pacer();
    }
}

/// First half of the words of `line`, or `None` for single-word lines.
fn interim_prefix(line: &str) -> Option<String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }
    Some(words[..words.len() / 2].join(" "))
}

// =============================================================================
// Tests
// =============================================================================
