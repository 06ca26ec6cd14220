//! LunatiX voice crate - continuous speech capture over an auto-terminating
//! recognition capability.
//!
//! The `VoiceSessionController` hides the platform's habit of ending a
//! recognition session on its own (silence timeouts and the like): while the
//! user still wants to listen, an `ended` signal triggers exactly one restart.
//! Finalized utterances are handed to a `TranscriptionSink`; the controller
//! never sees the chat transcript.

pub mod controller;
pub mod error;
pub mod recognizer;
pub mod state;

pub use controller::VoiceSessionController;
pub use error::VoiceError;
pub use recognizer::{
    RecognitionAlternative, RecognitionHandle, RecognitionSignal, ScriptedRecognizer,
    SignalEmitter, SpeechRecognizer, UnavailableRecognizer,
};
pub use state::{VoiceSessionStatus, VoiceStatus};
