//! Voice session status and its legal transitions.
//!
//! - Idle -> Connecting (start requested)
//! - Connecting -> Ready (platform acknowledged)
//! - Ready -> Connecting (platform ended the session, restarting)
//! - Connecting -> Connecting (ended again before acknowledging)
//! - Idle/Connecting/Ready/Error -> Error (unavailable, platform failure,
//!   restart failure)
//! - Error -> Connecting (fresh start)
//! - Connecting/Ready/Error -> Idle (stop)

use std::fmt;

use serde::{Deserialize, Serialize};

/// Externally observable state of the voice session controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceSessionStatus {
    /// No recognition handle exists.
    #[default]
    Idle,
    /// A handle was told to start and the platform has not acknowledged yet.
    Connecting,
    /// The platform is capturing speech.
    Ready,
    /// Recognition failed; see `VoiceStatus::last_error`.
    Error,
}

impl fmt::Display for VoiceSessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceSessionStatus::Idle => write!(f, "idle"),
            VoiceSessionStatus::Connecting => write!(f, "connecting"),
            VoiceSessionStatus::Ready => write!(f, "ready"),
            VoiceSessionStatus::Error => write!(f, "error"),
        }
    }
}

impl VoiceSessionStatus {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &VoiceSessionStatus) -> bool {
        use VoiceSessionStatus::*;
        matches!(
            (self, target),
            (Idle, Connecting)
                | (Connecting, Ready)
                // Restart on platform end
                | (Ready, Connecting)
                | (Connecting, Connecting)
                // Failures
                | (Idle, Error)
                | (Connecting, Error)
                | (Ready, Error)
                | (Error, Error)
                // Fresh start after a failure
                | (Error, Connecting)
                // Stop
                | (Connecting, Idle)
                | (Ready, Idle)
                | (Error, Idle)
        )
    }

    /// Whether a recognition session is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            VoiceSessionStatus::Connecting | VoiceSessionStatus::Ready
        )
    }
}

/// Snapshot published to status subscribers.
///
/// `last_error` is only ever `Some` while `status` is `Error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStatus {
    pub status: VoiceSessionStatus,
    pub last_error: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================
