//! Voice session controller.
//!
//! Presents a continuous "listen" abstraction over a recognizer whose
//! sessions end on their own. Two levels of state are tracked: the outer
//! `VoiceSessionStatus` that subscribers see, and the inner pair of
//! listening intent (has the user asked to listen) and `platform_active`
//! (has the platform told us it is capturing right now). An `ended` signal
//! while the intent is still set restarts the platform exactly once; a
//! failed restart is terminal for the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use lunatix_core::types::{Role, TranscriptionSink};

use crate::error::VoiceError;
use crate::recognizer::{
    RecognitionAlternative, RecognitionHandle, RecognitionSignal, SignalEmitter,
    SpeechRecognizer, TaggedSignal,
};
use crate::state::{VoiceSessionStatus, VoiceStatus};

/// `last_error` used when the platform fails without giving a reason.
const GENERIC_PLATFORM_ERROR: &str = "speech recognition failed";

/// The recognition handle currently owned by the controller.
struct ActiveHandle {
    generation: u64,
    attached: Arc<AtomicBool>,
    handle: Box<dyn RecognitionHandle>,
}

impl ActiveHandle {
    /// Detach signal delivery first, then stop the platform session.
    fn discard(mut self) {
        self.attached.store(false, Ordering::Release);
        self.handle.stop();
        tracing::debug!(generation = self.generation, "Recognition handle discarded");
    }
}

struct ControllerState {
    status: VoiceSessionStatus,
    last_error: Option<String>,
    listening: bool,
    platform_active: bool,
    active: Option<ActiveHandle>,
    next_generation: u64,
}

impl ControllerState {
    fn snapshot(&self) -> VoiceStatus {
        VoiceStatus {
            status: self.status,
            last_error: self.last_error.clone(),
        }
    }
}

/// Drives one continuous speech-capture session.
pub struct VoiceSessionController {
    recognizer: Arc<dyn SpeechRecognizer>,
    sink: Arc<dyn TranscriptionSink>,
    state: Mutex<ControllerState>,
    signal_tx: mpsc::UnboundedSender<TaggedSignal>,
    signal_rx: Mutex<Option<mpsc::UnboundedReceiver<TaggedSignal>>>,
    status_tx: watch::Sender<VoiceStatus>,
}

impl std::fmt::Debug for VoiceSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSessionController")
            .field("status", &self.status())
            .field("listening", &self.is_listening())
            .finish()
    }
}

impl VoiceSessionController {
    /// Create an idle controller that reports utterances to `sink`.
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, sink: Arc<dyn TranscriptionSink>) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(VoiceStatus::default());
        Self {
            recognizer,
            sink,
            state: Mutex::new(ControllerState {
                status: VoiceSessionStatus::Idle,
                last_error: None,
                listening: false,
                platform_active: false,
                active: None,
                next_generation: 0,
            }),
            signal_tx,
            signal_rx: Mutex::new(Some(signal_rx)),
            status_tx,
        }
    }

    pub fn status(&self) -> VoiceSessionStatus {
        self.lock().status
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Whether the user currently wants to be listening.
    pub fn is_listening(&self) -> bool {
        self.lock().listening
    }

    /// Whether the platform has acknowledged the current session.
    pub fn is_platform_active(&self) -> bool {
        self.lock().platform_active
    }

    pub fn snapshot(&self) -> VoiceStatus {
        self.lock().snapshot()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<VoiceStatus> {
        self.status_tx.subscribe()
    }

    /// Begin listening.
    ///
    /// Returns `true` if a platform start was issued. Calling this while a
    /// session is connecting or ready is a no-op.
    pub fn start(&self) -> bool {
        let mut state = self.lock();
        if state.active.is_some() || state.status.is_active() {
            tracing::debug!(status = %state.status, "Voice start ignored, session already active");
            return false;
        }

        if !self.recognizer.is_available() {
            tracing::warn!("Speech recognition unavailable on this host");
            self.fail(&mut state, VoiceError::Unavailable.to_string());
            return false;
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let attached = Arc::new(AtomicBool::new(true));
        let emitter = SignalEmitter::new(generation, Arc::clone(&attached), self.signal_tx.clone());

        let handle = match self.recognizer.create(emitter) {
            Ok(handle) => handle,
            Err(e) => {
                attached.store(false, Ordering::Release);
                tracing::warn!(error = %e, "Failed to create recognition handle");
                self.fail(&mut state, e.to_string());
                return false;
            }
        };

        state.active = Some(ActiveHandle {
            generation,
            attached,
            handle,
        });
        state.last_error = None;
        state.listening = true;
        self.transition(&mut state, VoiceSessionStatus::Connecting);

        if let Err(e) = Self::start_platform(&mut state) {
            tracing::warn!(error = %e, "Failed to start speech recognition");
            self.fail(&mut state, e.to_string());
            return false;
        }

        tracing::info!(generation, "Voice session started");
        true
    }

    /// Stop listening and discard the recognition handle.
    ///
    /// Signal delivery is detached before the handle is stopped, so nothing
    /// the old handle emits afterwards reaches the controller. Calling this
    /// with no active handle is a no-op.
    pub fn stop(&self) {
        let mut state = self.lock();
        let Some(active) = state.active.take() else {
            return;
        };
        state.listening = false;
        state.platform_active = false;
        active.discard();
        self.transition(&mut state, VoiceSessionStatus::Idle);
        tracing::info!("Voice session stopped");
    }

    /// Handle every signal already queued, without waiting.
    ///
    /// Returns the number of signals taken off the queue, or zero if the
    /// queue is owned by a running signal loop.
    pub fn process_pending(&self) -> usize {
        let mut pending = Vec::new();
        {
            let mut rx = self.signal_rx.lock().expect("signal receiver mutex poisoned");
            let Some(rx) = rx.as_mut() else {
                return 0;
            };
            while let Ok(tagged) = rx.try_recv() {
                pending.push(tagged);
            }
        }
        let count = pending.len();
        for tagged in pending {
            self.handle_signal(tagged);
        }
        count
    }

    /// Move signal handling onto a background task.
    ///
    /// The task holds only a weak reference, so it ends once the controller
    /// is dropped. Returns `None` if the loop was already spawned.
    pub fn spawn_signal_loop(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut rx = self
            .signal_rx
            .lock()
            .expect("signal receiver mutex poisoned")
            .take()?;
        let weak = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            while let Some(tagged) = rx.recv().await {
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                controller.handle_signal(tagged);
            }
            tracing::debug!("Voice signal loop finished");
        }))
    }

    fn handle_signal(&self, tagged: TaggedSignal) {
        let mut utterances = Vec::new();
        {
            let mut state = self.lock();
            let current = state.active.as_ref().map(|a| a.generation);
            if current != Some(tagged.generation) {
                tracing::trace!(
                    generation = tagged.generation,
                    signal = ?tagged.signal,
                    "Ignoring signal from stale recognition handle"
                );
                return;
            }

            match tagged.signal {
                RecognitionSignal::Started => {
                    state.platform_active = true;
                    if state.status == VoiceSessionStatus::Connecting {
                        self.transition(&mut state, VoiceSessionStatus::Ready);
                    }
                }
                RecognitionSignal::Result(alternatives) => {
                    utterances = finalized_utterances(alternatives);
                }
                RecognitionSignal::Ended => self.on_platform_ended(&mut state),
                RecognitionSignal::Error(reason) => {
                    let message = reason
                        .map(|r| r.trim().to_string())
                        .filter(|r| !r.is_empty())
                        .map(|r| VoiceError::Platform(r).to_string())
                        .unwrap_or_else(|| GENERIC_PLATFORM_ERROR.to_string());
                    tracing::warn!(error = %message, "Speech recognition reported an error");
                    self.fail(&mut state, message);
                }
            }
        }

        // Outside the lock: the sink may call back into the chat pipeline.
        for text in utterances {
            tracing::debug!(text_len = text.len(), "Finalized utterance recognized");
            self.sink.on_transcription(Role::User, text);
        }
    }

    /// Only reached for the current handle, which implies listening intent:
    /// `stop` and `fail` clear the intent and take the handle together, so an
    /// `ended` that follows them carries a stale generation and never gets
    /// here. The move to `idle` after a stop is made by `stop` itself.
    fn on_platform_ended(&self, state: &mut ControllerState) {
        state.platform_active = false;
        tracing::debug!("Recognition ended while listening, restarting");
        self.transition(state, VoiceSessionStatus::Connecting);
        if let Err(e) = Self::start_platform(state) {
            tracing::warn!(error = %e, "Failed to restart speech recognition");
            self.fail(state, e.to_string());
        }
    }

    fn start_platform(state: &mut ControllerState) -> Result<(), VoiceError> {
        match state.active.as_mut() {
            Some(active) => active.handle.start(),
            None => Err(VoiceError::Start("no recognition handle".to_string())),
        }
    }

    /// Enter `Error`: clear the intent and discard the handle.
    fn fail(&self, state: &mut ControllerState, message: String) {
        state.listening = false;
        state.platform_active = false;
        if let Some(active) = state.active.take() {
            active.discard();
        }
        state.last_error = Some(message);
        self.transition(state, VoiceSessionStatus::Error);
    }

    fn transition(&self, state: &mut ControllerState, target: VoiceSessionStatus) {
        if !state.status.can_transition_to(&target) {
            tracing::warn!("Unexpected voice status transition: {} -> {}", state.status, target);
        }
        tracing::debug!("Voice status: {} -> {}", state.status, target);
        state.status = target;
        if target != VoiceSessionStatus::Error {
            state.last_error = None;
        }
        self.status_tx.send_replace(state.snapshot());
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().expect("voice controller mutex poisoned")
    }
}

impl Drop for VoiceSessionController {
    fn drop(&mut self) {
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.listening = false;
        state.platform_active = false;
        if let Some(active) = state.active.take() {
            active.discard();
        }
    }
}

fn finalized_utterances(alternatives: Vec<RecognitionAlternative>) -> Vec<String> {
    alternatives
        .into_iter()
        .filter(|alt| alt.is_final)
        .map(|alt| alt.transcript.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct ManualState {
        emitters: Vec<SignalEmitter>,
        creates: usize,
        starts: usize,
        stops: usize,
        fail_create: bool,
        fail_starts_from: Option<usize>,
    }

    /// Recognizer whose signals are emitted by hand from the test.
    #[derive(Default)]
    struct ManualRecognizer {
        unavailable: bool,
        state: Arc<Mutex<ManualState>>,
    }

    impl ManualRecognizer {
        fn emitter(&self) -> SignalEmitter {
            self.state.lock().unwrap().emitters.last().cloned().unwrap()
        }

        fn emit(&self, signal: RecognitionSignal) -> bool {
            self.emitter().emit(signal)
        }

        fn starts(&self) -> usize {
            self.state.lock().unwrap().starts
        }

        fn creates(&self) -> usize {
            self.state.lock().unwrap().creates
        }

        fn stops(&self) -> usize {
            self.state.lock().unwrap().stops
        }
    }

    impl SpeechRecognizer for ManualRecognizer {
        fn is_available(&self) -> bool {
            !self.unavailable
        }

        fn create(
            &self,
            emitter: SignalEmitter,
        ) -> Result<Box<dyn RecognitionHandle>, VoiceError> {
            let mut state = self.state.lock().unwrap();
            state.creates += 1;
            if state.fail_create {
                return Err(VoiceError::Create("microphone busy".to_string()));
            }
            state.emitters.push(emitter);
            Ok(Box::new(ManualHandle {
                state: Arc::clone(&self.state),
            }))
        }
    }

    struct ManualHandle {
        state: Arc<Mutex<ManualState>>,
    }

    impl RecognitionHandle for ManualHandle {
        fn start(&mut self) -> Result<(), VoiceError> {
            let mut state = self.state.lock().unwrap();
            state.starts += 1;
            match state.fail_starts_from {
                Some(n) if state.starts >= n => {
                    Err(VoiceError::Start("audio-capture".to_string()))
                }
                _ => Ok(()),
            }
        }

        fn stop(&mut self) {
            self.state.lock().unwrap().stops += 1;
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        received: Mutex<Vec<(Role, String)>>,
    }

    impl RecordingSink {
        fn texts(&self) -> Vec<String> {
            self.received
                .lock()
                .unwrap()
                .iter()
                .map(|(_, t)| t.clone())
                .collect()
        }
    }

    impl TranscriptionSink for RecordingSink {
        fn on_transcription(&self, role: Role, text: String) {
            self.received.lock().unwrap().push((role, text));
        }
    }

    fn setup(
        recognizer: ManualRecognizer,
    ) -> (Arc<ManualRecognizer>, Arc<RecordingSink>, VoiceSessionController) {
        let recognizer = Arc::new(recognizer);
        let sink = Arc::new(RecordingSink::default());
        let controller = VoiceSessionController::new(recognizer.clone(), sink.clone());
        (recognizer, sink, controller)
    }

    fn ready(recognizer: &ManualRecognizer, controller: &VoiceSessionController) {
        assert!(controller.start());
        recognizer.emit(RecognitionSignal::Started);
        controller.process_pending();
        assert_eq!(controller.status(), VoiceSessionStatus::Ready);
    }

    // ---- Start ----

    #[test]
    fn test_new_controller_is_idle() {
        let (_, _, controller) = setup(ManualRecognizer::default());
        assert_eq!(controller.status(), VoiceSessionStatus::Idle);
        assert!(controller.last_error().is_none());
        assert!(!controller.is_listening());
    }

    #[test]
    fn test_start_then_started_is_ready() {
        let (recognizer, _, controller) = setup(ManualRecognizer::default());

        assert!(controller.start());
        assert_eq!(controller.status(), VoiceSessionStatus::Connecting);
        assert!(controller.is_listening());
        assert!(!controller.is_platform_active());
        assert_eq!(recognizer.starts(), 1);

        recognizer.emit(RecognitionSignal::Started);
        assert_eq!(controller.process_pending(), 1);
        assert_eq!(controller.status(), VoiceSessionStatus::Ready);
        assert!(controller.is_platform_active());
    }

    #[test]
    fn test_start_while_active_is_noop() {
        let (recognizer, _, controller) = setup(ManualRecognizer::default());
        assert!(controller.start());
        assert!(!controller.start());

        recognizer.emit(RecognitionSignal::Started);
        controller.process_pending();
        assert!(!controller.start());

        assert_eq!(recognizer.creates(), 1);
        assert_eq!(recognizer.starts(), 1);
    }

    #[test]
    fn test_start_unavailable_goes_to_error() {
        let (recognizer, _, controller) = setup(ManualRecognizer {
            unavailable: true,
            ..ManualRecognizer::default()
        });

        assert!(!controller.start());
        assert_eq!(controller.status(), VoiceSessionStatus::Error);
        assert!(controller.last_error().unwrap().contains("not supported"));
        assert_eq!(recognizer.creates(), 0);
        assert!(!controller.is_listening());
    }

    #[test]
    fn test_create_failure_goes_to_error() {
        let recognizer = ManualRecognizer::default();
        recognizer.state.lock().unwrap().fail_create = true;
        let (_, _, controller) = setup(recognizer);

        assert!(!controller.start());
        assert_eq!(controller.status(), VoiceSessionStatus::Error);
        assert!(controller.last_error().unwrap().contains("microphone busy"));
    }

    #[test]
    fn test_initial_start_failure_goes_to_error() {
        let recognizer = ManualRecognizer::default();
        recognizer.state.lock().unwrap().fail_starts_from = Some(1);
        let (recognizer, _, controller) = setup(recognizer);

        assert!(!controller.start());
        assert_eq!(controller.status(), VoiceSessionStatus::Error);
        assert!(!controller.is_listening());
        // Handle was stopped on the way out.
        assert_eq!(recognizer.stops(), 1);
    }

    // ---- Results ----

    #[test]
    fn test_finalized_results_are_trimmed_and_emitted() {
        let (recognizer, sink, controller) = setup(ManualRecognizer::default());
        ready(&recognizer, &controller);

        recognizer.emit(RecognitionSignal::Result(vec![
            RecognitionAlternative::interim("what is"),
            RecognitionAlternative::finalized("  What is a deductible?  "),
            RecognitionAlternative::finalized("   "),
            RecognitionAlternative::finalized("and a premium"),
        ]));
        controller.process_pending();

        assert_eq!(
            sink.texts(),
            vec!["What is a deductible?".to_string(), "and a premium".to_string()]
        );
        assert!(sink
            .received
            .lock()
            .unwrap()
            .iter()
            .all(|(role, _)| *role == Role::User));
        assert_eq!(controller.status(), VoiceSessionStatus::Ready);
    }

    #[test]
    fn test_interim_only_result_emits_nothing() {
        let (recognizer, sink, controller) = setup(ManualRecognizer::default());
        ready(&recognizer, &controller);

        recognizer.emit(RecognitionSignal::Result(vec![
            RecognitionAlternative::interim("my car"),
        ]));
        controller.process_pending();
        assert!(sink.texts().is_empty());
    }

    // ---- Restart on end ----

    #[test]
    fn test_ended_while_listening_restarts() {
        let (recognizer, _, controller) = setup(ManualRecognizer::default());
        ready(&recognizer, &controller);

        recognizer.emit(RecognitionSignal::Ended);
        controller.process_pending();
        assert_eq!(controller.status(), VoiceSessionStatus::Connecting);
        assert!(!controller.is_platform_active());
        assert_eq!(recognizer.starts(), 2);

        recognizer.emit(RecognitionSignal::Started);
        controller.process_pending();
        assert_eq!(controller.status(), VoiceSessionStatus::Ready);

        // A second end repeats the pattern, one start per end.
        recognizer.emit(RecognitionSignal::Ended);
        controller.process_pending();
        assert_eq!(controller.status(), VoiceSessionStatus::Connecting);
        assert_eq!(recognizer.starts(), 3);

        recognizer.emit(RecognitionSignal::Started);
        controller.process_pending();
        assert_eq!(controller.status(), VoiceSessionStatus::Ready);
        assert_eq!(recognizer.creates(), 1);
    }

    #[test]
    fn test_restart_failure_is_terminal() {
        let (recognizer, _, controller) = setup(ManualRecognizer::default());
        ready(&recognizer, &controller);
        recognizer.state.lock().unwrap().fail_starts_from = Some(2);

        recognizer.emit(RecognitionSignal::Ended);
        controller.process_pending();

        assert_eq!(controller.status(), VoiceSessionStatus::Error);
        assert!(controller.last_error().unwrap().contains("audio-capture"));
        assert!(!controller.is_listening());
        assert_eq!(recognizer.starts(), 2);

        // No further retries from the discarded handle.
        assert!(!recognizer.emit(RecognitionSignal::Ended));
        controller.process_pending();
        assert_eq!(recognizer.starts(), 2);
    }

    // ---- Platform errors ----

    #[test]
    fn test_platform_error_sets_error_without_restart() {
        let (recognizer, _, controller) = setup(ManualRecognizer::default());
        ready(&recognizer, &controller);

        recognizer.emit(RecognitionSignal::Error(Some("not-allowed".to_string())));
        recognizer.emit(RecognitionSignal::Ended);
        controller.process_pending();

        assert_eq!(controller.status(), VoiceSessionStatus::Error);
        assert_eq!(
            controller.last_error().as_deref(),
            Some("speech recognition error: not-allowed")
        );
        assert!(!controller.is_listening());
        assert_eq!(recognizer.starts(), 1);
    }

    #[test]
    fn test_platform_error_without_reason_uses_generic_message() {
        let (recognizer, _, controller) = setup(ManualRecognizer::default());
        ready(&recognizer, &controller);

        recognizer.emit(RecognitionSignal::Error(None));
        controller.process_pending();

        assert_eq!(
            controller.last_error().as_deref(),
            Some(GENERIC_PLATFORM_ERROR)
        );
    }

    #[test]
    fn test_fresh_start_after_error_clears_last_error() {
        let (recognizer, _, controller) = setup(ManualRecognizer::default());
        ready(&recognizer, &controller);
        recognizer.emit(RecognitionSignal::Error(Some("network".to_string())));
        controller.process_pending();
        assert!(controller.last_error().is_some());

        assert!(controller.start());
        assert_eq!(controller.status(), VoiceSessionStatus::Connecting);
        assert!(controller.last_error().is_none());
        assert_eq!(recognizer.creates(), 2);
    }

    // ---- Stop ----

    #[test]
    fn test_stop_returns_to_idle() {
        let (recognizer, _, controller) = setup(ManualRecognizer::default());
        ready(&recognizer, &controller);

        controller.stop();
        assert_eq!(controller.status(), VoiceSessionStatus::Idle);
        assert!(!controller.is_listening());
        assert_eq!(recognizer.stops(), 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (recognizer, _, controller) = setup(ManualRecognizer::default());
        controller.stop();
        assert_eq!(controller.status(), VoiceSessionStatus::Idle);

        ready(&recognizer, &controller);
        controller.stop();
        controller.stop();
        assert_eq!(controller.status(), VoiceSessionStatus::Idle);
        assert_eq!(recognizer.stops(), 1);
    }

    #[test]
    fn test_result_after_stop_is_not_transcribed() {
        let (recognizer, sink, controller) = setup(ManualRecognizer::default());
        ready(&recognizer, &controller);
        let old_emitter = recognizer.emitter();

        controller.stop();

        assert!(!old_emitter.is_attached());
        assert!(!old_emitter.emit(RecognitionSignal::Result(vec![
            RecognitionAlternative::finalized("late words"),
        ])));
        controller.process_pending();
        assert!(sink.texts().is_empty());
        assert_eq!(controller.status(), VoiceSessionStatus::Idle);
    }

    #[test]
    fn test_signals_queued_before_stop_are_ignored() {
        let (recognizer, sink, controller) = setup(ManualRecognizer::default());
        ready(&recognizer, &controller);

        recognizer.emit(RecognitionSignal::Result(vec![
            RecognitionAlternative::finalized("queued words"),
        ]));
        recognizer.emit(RecognitionSignal::Ended);
        controller.stop();
        assert_eq!(controller.process_pending(), 2);

        assert!(sink.texts().is_empty());
        assert_eq!(controller.status(), VoiceSessionStatus::Idle);
        assert_eq!(recognizer.starts(), 1);
    }

    #[test]
    fn test_ended_queued_behind_error_keeps_error() {
        let (recognizer, _, controller) = setup(ManualRecognizer::default());
        ready(&recognizer, &controller);

        recognizer.emit(RecognitionSignal::Error(Some("network".to_string())));
        recognizer.emit(RecognitionSignal::Ended);
        assert_eq!(controller.process_pending(), 2);

        assert_eq!(controller.status(), VoiceSessionStatus::Error);
        assert!(controller.last_error().unwrap().contains("network"));
        assert!(!controller.is_listening());
        assert_eq!(recognizer.starts(), 1);
    }

    #[test]
    fn test_stale_generation_ignored_after_restart_from_error() {
        let (recognizer, sink, controller) = setup(ManualRecognizer::default());
        ready(&recognizer, &controller);
        let first = recognizer.emitter();
        recognizer.emit(RecognitionSignal::Error(Some("network".to_string())));
        controller.process_pending();

        assert!(controller.start());
        let second = recognizer.emitter();
        assert_ne!(first.generation(), second.generation());

        assert!(!first.emit(RecognitionSignal::Started));
        second.emit(RecognitionSignal::Started);
        second.emit(RecognitionSignal::Result(vec![
            RecognitionAlternative::finalized("second session"),
        ]));
        controller.process_pending();
        assert_eq!(controller.status(), VoiceSessionStatus::Ready);
        assert_eq!(sink.texts(), vec!["second session".to_string()]);
    }

    // ---- Teardown ----

    #[test]
    fn test_drop_detaches_handle() {
        let (recognizer, _, controller) = setup(ManualRecognizer::default());
        ready(&recognizer, &controller);
        let emitter = recognizer.emitter();

        drop(controller);

        assert!(!emitter.is_attached());
        assert!(!emitter.emit(RecognitionSignal::Ended));
        assert_eq!(recognizer.stops(), 1);
    }

    // ---- Status subscription ----

    #[test]
    fn test_subscriber_sees_status_changes() {
        let (recognizer, _, controller) = setup(ManualRecognizer::default());
        let rx = controller.subscribe();
        assert_eq!(rx.borrow().status, VoiceSessionStatus::Idle);

        ready(&recognizer, &controller);
        assert_eq!(rx.borrow().status, VoiceSessionStatus::Ready);

        recognizer.emit(RecognitionSignal::Error(Some("no-speech".to_string())));
        controller.process_pending();
        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.status, VoiceSessionStatus::Error);
        assert!(snapshot.last_error.unwrap().contains("no-speech"));
        assert_eq!(controller.snapshot().status, VoiceSessionStatus::Error);
    }

    // ---- Signal loop ----

    #[tokio::test]
    async fn test_signal_loop_drives_transitions() {
        let (recognizer, sink, controller) = setup(ManualRecognizer::default());
        let controller = Arc::new(controller);
        let mut rx = controller.subscribe();
        let task = controller.spawn_signal_loop().unwrap();
        assert!(controller.spawn_signal_loop().is_none());
        assert_eq!(controller.process_pending(), 0);

        assert!(controller.start());
        recognizer.emit(RecognitionSignal::Started);
        rx.wait_for(|s| s.status == VoiceSessionStatus::Ready)
            .await
            .unwrap();

        recognizer.emit(RecognitionSignal::Result(vec![
            RecognitionAlternative::finalized("hello"),
        ]));
        recognizer.emit(RecognitionSignal::Error(None));
        rx.wait_for(|s| s.status == VoiceSessionStatus::Error)
            .await
            .unwrap();
        assert_eq!(sink.texts(), vec!["hello".to_string()]);

        drop(controller);
        task.abort();
    }
}
