//! Error types for the session controller

use crate::media::{MediaOp, Track};
use crate::state_machine::SessionState;

/// Errors raised while driving a session.
///
/// Only `CapabilityUnavailable` and `LoopClosed` ever reach a caller.
/// `InvalidDurationSelection` is recovered by substituting the "off" duration and
/// `InconsistentTransition` is treated as a no-op; both exist so they can be logged
/// with a consistent message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The device refused to start or resume a track. The session is back in `Idle`.
    #[error("{track} {op} failed: {reason}")]
    CapabilityUnavailable {
        track: Track,
        op: MediaOp,
        reason: String,
    },

    #[error("no {track} duration at index {index}")]
    InvalidDurationSelection { track: Track, index: usize },

    #[error("no transition for {event} while {state}")]
    InconsistentTransition { state: SessionState, event: String },

    /// The session loop has shut down and can no longer accept commands.
    #[error("session loop is no longer running")]
    LoopClosed,
}
