//! Session state machine
//!
//! ```text
//! Idle -> Capturing -> Captured -> Processing -> Rendered
//!                         ^            |  ^          |
//!                         +-- failure -+  +----------+
//! any state -> Idle (reset)
//! ```

use serde::Serialize;
use std::fmt;

/// Lifecycle state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionState {
    /// No buffers held (default state)
    #[default]
    Idle,
    /// Capture collaborator is appending audio
    Capturing,
    /// A decoded recording is available
    Captured,
    /// A render is in flight
    Processing,
    /// A rendered buffer is available
    Rendered,
}

impl SessionState {
    /// True when a recording (decoded source) is held
    pub fn has_recording(&self) -> bool {
        matches!(
            self,
            SessionState::Captured | SessionState::Processing | SessionState::Rendered
        )
    }

    /// True for the states `apply_effect` accepts
    pub fn can_apply_effect(&self) -> bool {
        matches!(self, SessionState::Captured | SessionState::Rendered)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Capturing => write!(f, "Capturing"),
            SessionState::Captured => write!(f, "Captured"),
            SessionState::Processing => write!(f, "Processing"),
            SessionState::Rendered => write!(f, "Rendered"),
        }
    }
}
