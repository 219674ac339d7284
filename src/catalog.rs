//! Selectable phase lengths for the sound and capture phases
//!
//! Both option lists start with the "off" sentinel (zero seconds) at index 0.
//! Lookups never fail: an out-of-range index resolves to the sentinel.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::media::Track;

/// Label used for the zero-length sentinel entry.
pub const OFF_LABEL: &str = "off";

/// A selectable phase length. Two durations are equal when their labels are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDuration {
    label: String,
    seconds: u64,
}

impl PhaseDuration {
    pub fn new(label: impl Into<String>, seconds: u64) -> Self {
        Self {
            label: label.into(),
            seconds,
        }
    }

    /// The "off" sentinel.
    pub fn off() -> Self {
        Self::new(OFF_LABEL, 0)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn is_off(&self) -> bool {
        self.seconds == 0
    }
}

impl PartialEq for PhaseDuration {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
    }
}

impl Eq for PhaseDuration {}

/// Read-only option lists for both phases.
#[derive(Debug, Clone)]
pub struct DurationCatalog {
    sound: Vec<PhaseDuration>,
    capture: Vec<PhaseDuration>,
}

impl DurationCatalog {
    /// Build a catalog from explicit option lists.
    /// A list that does not start with a zero-length entry gets the sentinel prepended.
    pub fn new(sound: Vec<PhaseDuration>, capture: Vec<PhaseDuration>) -> Self {
        Self {
            sound: with_sentinel(sound),
            capture: with_sentinel(capture),
        }
    }

    pub fn sound_options(&self) -> &[PhaseDuration] {
        &self.sound
    }

    pub fn capture_options(&self) -> &[PhaseDuration] {
        &self.capture
    }

    pub fn resolve_sound(&self, index: usize) -> PhaseDuration {
        resolve(&self.sound, Track::Emission, index)
    }

    pub fn resolve_capture(&self, index: usize) -> PhaseDuration {
        resolve(&self.capture, Track::Capture, index)
    }
}

impl Default for DurationCatalog {
    fn default() -> Self {
        Self::new(
            vec![
                PhaseDuration::off(),
                PhaseDuration::new("1 min", 60),
                PhaseDuration::new("5 min", 5 * 60),
                PhaseDuration::new("10 min", 10 * 60),
            ],
            vec![
                PhaseDuration::off(),
                PhaseDuration::new("1 min", 60),
                PhaseDuration::new("5 min", 5 * 60),
                PhaseDuration::new("1 hour", 60 * 60),
            ],
        )
    }
}

fn with_sentinel(mut options: Vec<PhaseDuration>) -> Vec<PhaseDuration> {
    if options.first().map_or(true, |first| !first.is_off()) {
        options.insert(0, PhaseDuration::off());
    }
    options
}

fn resolve(options: &[PhaseDuration], track: Track, index: usize) -> PhaseDuration {
    match options.get(index) {
        Some(duration) => duration.clone(),
        None => {
            log::debug!(
                "{}; using \"{}\"",
                SessionError::InvalidDurationSelection { track, index },
                OFF_LABEL
            );
            PhaseDuration::off()
        }
    }
}
