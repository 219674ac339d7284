//! Media capability port
//!
//! The session controller never touches audio hardware itself. The host supplies a
//! [`MediaPort`] that starts, stops, pauses and resumes the two tracks: sound emission
//! and audio capture. Each call is expected to return promptly.

pub mod simulated;

pub use simulated::SimulatedMediaPort;

use std::fmt;

/// One of the two mutually exclusive media activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    Emission,
    Capture,
}

impl Track {
    pub fn as_str(&self) -> &'static str {
        match self {
            Track::Emission => "emission",
            Track::Capture => "capture",
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation performed on a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaOp {
    Start,
    Stop,
    Pause,
    Resume,
}

impl MediaOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaOp::Start => "start",
            MediaOp::Stop => "stop",
            MediaOp::Pause => "pause",
            MediaOp::Resume => "resume",
        }
    }

    /// Start and resume acquire the device; their failure aborts the cycle.
    pub fn is_acquiring(&self) -> bool {
        matches!(self, MediaOp::Start | MediaOp::Resume)
    }
}

impl fmt::Display for MediaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reported by a media port.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("device busy")]
    DeviceBusy,
    #[error("{0} is not active")]
    NotActive(Track),
    #[error("device error: {0}")]
    Device(String),
}

/// Device control surface consumed by the session controller.
pub trait MediaPort: Send + 'static {
    fn start_emission(&mut self) -> Result<(), MediaError>;
    fn stop_emission(&mut self) -> Result<(), MediaError>;
    fn pause_emission(&mut self) -> Result<(), MediaError>;
    fn resume_emission(&mut self) -> Result<(), MediaError>;

    fn start_capture(&mut self) -> Result<(), MediaError>;
    fn stop_capture(&mut self) -> Result<(), MediaError>;
    fn pause_capture(&mut self) -> Result<(), MediaError>;
    fn resume_capture(&mut self) -> Result<(), MediaError>;

    /// Dispatch a `(track, op)` pair to the matching method.
    fn perform(&mut self, track: Track, op: MediaOp) -> Result<(), MediaError> {
        match (track, op) {
            (Track::Emission, MediaOp::Start) => self.start_emission(),
            (Track::Emission, MediaOp::Stop) => self.stop_emission(),
            (Track::Emission, MediaOp::Pause) => self.pause_emission(),
            (Track::Emission, MediaOp::Resume) => self.resume_emission(),
            (Track::Capture, MediaOp::Start) => self.start_capture(),
            (Track::Capture, MediaOp::Stop) => self.stop_capture(),
            (Track::Capture, MediaOp::Pause) => self.pause_capture(),
            (Track::Capture, MediaOp::Resume) => self.resume_capture(),
        }
    }
}
