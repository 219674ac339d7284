//! Simulated media port for running the session without audio hardware
//!
//! Tracks per-track activity so that pause/resume against an inactive track fails the
//! same way a real device would. Capture acquisition can be denied to exercise the
//! failure path.

use super::{MediaError, MediaPort, Track};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    Stopped,
    Running,
    Paused,
}

pub struct SimulatedMediaPort {
    emission_source: String,
    capture_target: String,
    deny_capture: bool,
    emission: TrackStatus,
    capture: TrackStatus,
}

impl SimulatedMediaPort {
    pub fn new(emission_source: impl Into<String>, capture_target: impl Into<String>) -> Self {
        Self {
            emission_source: emission_source.into(),
            capture_target: capture_target.into(),
            deny_capture: false,
            emission: TrackStatus::Stopped,
            capture: TrackStatus::Stopped,
        }
    }

    /// Refuse every capture start, as if recording permission had been denied.
    pub fn deny_capture(mut self, deny: bool) -> Self {
        self.deny_capture = deny;
        self
    }

    pub fn status(&self, track: Track) -> TrackStatus {
        match track {
            Track::Emission => self.emission,
            Track::Capture => self.capture,
        }
    }

    fn slot(&mut self, track: Track) -> &mut TrackStatus {
        match track {
            Track::Emission => &mut self.emission,
            Track::Capture => &mut self.capture,
        }
    }

    fn pause(&mut self, track: Track) -> Result<(), MediaError> {
        let slot = self.slot(track);
        if *slot != TrackStatus::Running {
            return Err(MediaError::NotActive(track));
        }
        *slot = TrackStatus::Paused;
        log::info!("Simulated: {} paused", track);
        Ok(())
    }

    fn resume(&mut self, track: Track) -> Result<(), MediaError> {
        let slot = self.slot(track);
        if *slot != TrackStatus::Paused {
            return Err(MediaError::NotActive(track));
        }
        *slot = TrackStatus::Running;
        log::info!("Simulated: {} resumed", track);
        Ok(())
    }

    fn stop(&mut self, track: Track) -> Result<(), MediaError> {
        let slot = self.slot(track);
        if *slot != TrackStatus::Stopped {
            *slot = TrackStatus::Stopped;
            log::info!("Simulated: {} stopped", track);
        }
        Ok(())
    }
}

impl MediaPort for SimulatedMediaPort {
    fn start_emission(&mut self) -> Result<(), MediaError> {
        self.emission = TrackStatus::Running;
        log::info!("Simulated: looping {}", self.emission_source);
        Ok(())
    }

    fn stop_emission(&mut self) -> Result<(), MediaError> {
        self.stop(Track::Emission)
    }

    fn pause_emission(&mut self) -> Result<(), MediaError> {
        self.pause(Track::Emission)
    }

    fn resume_emission(&mut self) -> Result<(), MediaError> {
        self.resume(Track::Emission)
    }

    fn start_capture(&mut self) -> Result<(), MediaError> {
        if self.deny_capture {
            log::warn!("Simulated: capture permission denied");
            return Err(MediaError::PermissionDenied);
        }
        self.capture = TrackStatus::Running;
        log::info!("Simulated: capturing to {}", self.capture_target);
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<(), MediaError> {
        self.stop(Track::Capture)
    }

    fn pause_capture(&mut self) -> Result<(), MediaError> {
        self.pause(Track::Capture)
    }

    fn resume_capture(&mut self) -> Result<(), MediaError> {
        self.resume(Track::Capture)
    }
}
