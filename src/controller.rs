//! Session controller
//!
//! Owns the session, the injected media port and tick clock, and the published
//! snapshot. Every inbound operation is turned into an [`Event`], run through
//! [`reduce`], and the resulting effects are executed in order against the port.
//!
//! Failure policy:
//! - a failed start/resume aborts the remaining effects, forces `Idle` and is
//!   returned to the caller
//! - a failed stop/pause is logged and the transition stands
//!
//! The controller is not thread-safe by itself; the session loop in `lib.rs`
//! serializes all calls onto one task.

use tokio::sync::watch;
use uuid::Uuid;

use crate::catalog::DurationCatalog;
use crate::clock::TickClock;
use crate::error::SessionError;
use crate::media::{MediaError, MediaPort, Track};
use crate::state_machine::{
    reduce, Effect, Event, HandledResult, Session, SessionSnapshot, SessionState,
};

/// A toggle request expressed as catalog indices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub sound_index: usize,
    pub capture_index: usize,
    /// The user picked new durations since the previous toggle
    pub durations_changed: bool,
}

impl Selection {
    pub fn new(sound_index: usize, capture_index: usize) -> Self {
        Self {
            sound_index,
            capture_index,
            durations_changed: false,
        }
    }

    pub fn changed(mut self) -> Self {
        self.durations_changed = true;
        self
    }
}

pub struct SessionController {
    catalog: DurationCatalog,
    session: Session,
    media: Box<dyn MediaPort>,
    clock: Box<dyn TickClock>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    pub fn new(
        catalog: DurationCatalog,
        media: Box<dyn MediaPort>,
        clock: Box<dyn TickClock>,
    ) -> Self {
        let session = Session::default();
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::from(&session));
        Self {
            catalog,
            session,
            media,
            clock,
            snapshot_tx,
        }
    }

    /// Change-notified view of the session for presentation.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from(&self.session)
    }

    /// Id of the running cycle, `None` while idle.
    pub fn cycle_id(&self) -> Option<Uuid> {
        self.session.cycle_id()
    }

    pub fn catalog(&self) -> &DurationCatalog {
        &self.catalog
    }

    pub fn clock_running(&self) -> bool {
        self.clock.is_running()
    }

    /// Start a cycle from `Idle`, or pause/resume the running one.
    pub fn toggle(
        &mut self,
        sound_index: usize,
        capture_index: usize,
    ) -> Result<SessionState, SessionError> {
        self.toggle_with(Selection::new(sound_index, capture_index))
    }

    pub fn toggle_with(&mut self, selection: Selection) -> Result<SessionState, SessionError> {
        let sound = self.catalog.resolve_sound(selection.sound_index);
        let capture = self.catalog.resolve_capture(selection.capture_index);
        log::info!(
            "Toggle: sound={} capture={} changed={}",
            sound.label(),
            capture.label(),
            selection.durations_changed
        );
        self.dispatch(Event::Toggle {
            sound_secs: sound.seconds(),
            capture_secs: capture.seconds(),
            durations_changed: selection.durations_changed,
        })?;
        Ok(self.state())
    }

    /// Advance the active countdown by one second.
    pub fn tick(&mut self) -> Result<(), SessionError> {
        self.dispatch(Event::Tick)
    }

    pub fn interruption_began(&mut self) {
        // Only pauses are issued here, and pause failures are not surfaced
        if let Err(e) = self.dispatch(Event::InterruptionBegan) {
            log::error!("Interruption handling failed: {}", e);
        }
    }

    pub fn interruption_ended(&mut self, should_resume: bool) -> Result<(), SessionError> {
        self.dispatch(Event::InterruptionEnded { should_resume })
    }

    pub fn remote_pause_intent(&mut self) -> HandledResult {
        self.remote_intent(Event::RemotePause, SessionState::is_active)
    }

    pub fn remote_play_intent(&mut self) -> HandledResult {
        self.remote_intent(Event::RemotePlay, SessionState::is_paused)
    }

    /// A track became unavailable outside of a controller call (for example a
    /// capture permission request that was denied after the cycle started).
    pub fn capability_failed(&mut self, track: Track, error: MediaError) {
        log::error!("{} capability lost: {}", track, error);
        if let Err(e) = self.dispatch(Event::CapabilityFailed { track }) {
            log::error!("Failed to end cycle after capability loss: {}", e);
        }
    }

    fn remote_intent(
        &mut self,
        event: Event,
        applicable: fn(&SessionState) -> bool,
    ) -> HandledResult {
        let state = self.state();
        if state == SessionState::Idle {
            return HandledResult::NotApplicable;
        }
        if !applicable(&state) {
            log::debug!(
                "{}",
                SessionError::InconsistentTransition {
                    state,
                    event: format!("{:?}", event),
                }
            );
            return HandledResult::Failed;
        }
        match self.dispatch(event) {
            Ok(()) => HandledResult::Handled,
            Err(e) => {
                log::warn!("Remote intent failed: {}", e);
                HandledResult::Failed
            }
        }
    }

    fn dispatch(&mut self, event: Event) -> Result<(), SessionError> {
        match self.apply(event) {
            Ok(()) => Ok(()),
            Err(err) => {
                if let SessionError::CapabilityUnavailable { track, .. } = &err {
                    // Effects of this transition are stops only; it cannot fail again
                    let _ = self.apply(Event::CapabilityFailed { track: *track });
                }
                Err(err)
            }
        }
    }

    fn apply(&mut self, event: Event) -> Result<(), SessionError> {
        log::debug!("Received event: {:?}", event);

        let (next, effects) = reduce(&self.session, event);
        if next.state() != self.session.state() {
            log::info!(
                "State transition: {} -> {}",
                self.session.state(),
                next.state()
            );
        }
        self.session = next;

        for effect in effects {
            match effect {
                Effect::Publish => self.publish(),
                Effect::StartTickClock { cycle_id } => self.clock.start(cycle_id),
                Effect::StopTickClock => self.clock.stop(),
                other => {
                    let Some((track, op)) = other.media_call() else {
                        continue;
                    };
                    if let Err(e) = self.media.perform(track, op) {
                        if op.is_acquiring() {
                            log::error!("Failed to {} {}: {}", op, track, e);
                            return Err(SessionError::CapabilityUnavailable {
                                track,
                                op,
                                reason: e.to_string(),
                            });
                        }
                        log::warn!("Failed to {} {} (continuing): {}", op, track, e);
                    }
                }
            }
        }
        Ok(())
    }

    fn publish(&self) {
        let snapshot = SessionSnapshot::from(&self.session);
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}
