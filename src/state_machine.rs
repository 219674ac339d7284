//! State machine for the phased sound/capture session
//!
//! This module implements the core state machine using a single-writer pattern.
//! All state transitions go through the `reduce()` function, which returns
//! a new session and a list of effects to execute. The reducer never performs I/O.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::error::SessionError;
use crate::media::{MediaOp, Track};

/// The five mutually exclusive session states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    #[default]
    Idle,
    Emitting,
    Capturing,
    PausedFromEmitting,
    PausedFromCapturing,
}

impl SessionState {
    /// Human-readable label for presentation.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Emitting => "Playing",
            SessionState::Capturing => "Recording",
            SessionState::PausedFromEmitting => "Playing paused",
            SessionState::PausedFromCapturing => "Recording paused",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Emitting | SessionState::Capturing)
    }

    pub fn is_paused(&self) -> bool {
        matches!(
            self,
            SessionState::PausedFromEmitting | SessionState::PausedFromCapturing
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Authoritative session data: current state, both countdowns and the id of the
/// running cycle (used to discard ticks from a cycle that already ended).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub(crate) state: SessionState,
    pub(crate) emission_remaining: u64,
    pub(crate) capture_remaining: u64,
    pub(crate) cycle_id: Option<Uuid>,
}

impl Session {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn emission_remaining(&self) -> u64 {
        self.emission_remaining
    }

    pub fn capture_remaining(&self) -> u64 {
        self.capture_remaining
    }

    pub fn cycle_id(&self) -> Option<Uuid> {
        self.cycle_id
    }
}

/// Read-only view published to observers.
/// Serializes as `{ "status": "emitting", "label": "Playing", "emissionRemainingSecs": 59, ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(rename = "status")]
    pub state: SessionState,
    pub label: &'static str,
    pub emission_remaining_secs: u64,
    pub capture_remaining_secs: u64,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::from(&Session::default())
    }
}

impl From<&Session> for SessionSnapshot {
    fn from(session: &Session) -> Self {
        Self {
            state: session.state,
            label: session.state.label(),
            emission_remaining_secs: session.emission_remaining,
            capture_remaining_secs: session.capture_remaining,
        }
    }
}

/// Result of a remote transport intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HandledResult {
    Handled,
    /// Nothing is playing or recording; the host should report a neutral result.
    NotApplicable,
    Failed,
}

/// Events that can trigger state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Start/pause/resume toggle with already-resolved phase lengths in seconds.
    /// `durations_changed` reloads both countdowns before a pause/resume.
    Toggle {
        sound_secs: u64,
        capture_secs: u64,
        durations_changed: bool,
    },
    /// One second elapsed on the tick clock
    Tick,
    InterruptionBegan,
    InterruptionEnded {
        should_resume: bool,
    },
    RemotePause,
    RemotePlay,
    /// A track could not be acquired (immediately or after a deferred permission check)
    CapabilityFailed {
        track: Track,
    },
}

/// Effects to be executed after a state transition, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartEmission,
    StopEmission,
    PauseEmission,
    ResumeEmission,
    StartCapture,
    StopCapture,
    PauseCapture,
    ResumeCapture,
    StartTickClock { cycle_id: Uuid },
    StopTickClock,
    /// Publish a fresh snapshot to observers
    Publish,
}

impl Effect {
    /// The media port call this effect maps to, if any.
    pub fn media_call(&self) -> Option<(Track, MediaOp)> {
        match self {
            Effect::StartEmission => Some((Track::Emission, MediaOp::Start)),
            Effect::StopEmission => Some((Track::Emission, MediaOp::Stop)),
            Effect::PauseEmission => Some((Track::Emission, MediaOp::Pause)),
            Effect::ResumeEmission => Some((Track::Emission, MediaOp::Resume)),
            Effect::StartCapture => Some((Track::Capture, MediaOp::Start)),
            Effect::StopCapture => Some((Track::Capture, MediaOp::Stop)),
            Effect::PauseCapture => Some((Track::Capture, MediaOp::Pause)),
            Effect::ResumeCapture => Some((Track::Capture, MediaOp::Resume)),
            Effect::StartTickClock { .. } | Effect::StopTickClock | Effect::Publish => None,
        }
    }
}

/// Reducer function: (session, event) -> (next_session, effects)
///
/// Key rules:
/// - Total over (state, event): an undefined pair leaves the session unchanged
/// - Counters only move while their phase is active, and never go below zero
/// - Entering `Idle` always stops both tracks and the tick clock
pub fn reduce(session: &Session, event: Event) -> (Session, Vec<Effect>) {
    use Effect::*;
    use SessionState::*;

    match (session.state, event) {
        // -----------------
        // Idle
        // -----------------
        (
            Idle,
            Event::Toggle {
                sound_secs: 0,
                capture_secs: 0,
                ..
            },
        ) => {
            log::debug!("Toggle ignored: both phases are off");
            (session.clone(), vec![])
        }
        (
            Idle,
            Event::Toggle {
                sound_secs,
                capture_secs,
                ..
            },
        ) => {
            let cycle_id = Uuid::new_v4();
            (
                Session {
                    state: Emitting,
                    emission_remaining: sound_secs,
                    capture_remaining: capture_secs,
                    cycle_id: Some(cycle_id),
                },
                vec![StartTickClock { cycle_id }, StartEmission, Publish],
            )
        }

        // -----------------
        // Toggle while a cycle is running
        // -----------------
        (
            state,
            Event::Toggle {
                sound_secs,
                capture_secs,
                durations_changed,
            },
        ) => {
            let mut next = session.clone();
            if durations_changed {
                next.emission_remaining = sound_secs;
                next.capture_remaining = capture_secs;
            }
            let effect = match state {
                Emitting => {
                    next.state = PausedFromEmitting;
                    PauseEmission
                }
                PausedFromEmitting => {
                    next.state = Emitting;
                    ResumeEmission
                }
                Capturing => {
                    next.state = PausedFromCapturing;
                    PauseCapture
                }
                // Idle is matched by the arms above
                PausedFromCapturing | Idle => {
                    next.state = Capturing;
                    ResumeCapture
                }
            };
            (next, vec![effect, Publish])
        }

        // -----------------
        // Countdown
        // -----------------
        (Emitting, Event::Tick) => {
            let remaining = session.emission_remaining.saturating_sub(1);
            if remaining == 0 {
                (
                    Session {
                        state: Capturing,
                        emission_remaining: 0,
                        ..session.clone()
                    },
                    vec![StopEmission, StartCapture, Publish],
                )
            } else {
                (
                    Session {
                        emission_remaining: remaining,
                        ..session.clone()
                    },
                    vec![Publish],
                )
            }
        }
        (Capturing, Event::Tick) => {
            let remaining = session.capture_remaining.saturating_sub(1);
            if remaining == 0 {
                (Session::default(), vec![StopCapture, StopTickClock, Publish])
            } else {
                (
                    Session {
                        capture_remaining: remaining,
                        ..session.clone()
                    },
                    vec![Publish],
                )
            }
        }
        // Paused: countdown is frozen. Idle: no clock should be running.
        (_, Event::Tick) => (session.clone(), vec![]),

        // -----------------
        // Interruptions and remote intents
        // -----------------
        (Emitting, Event::InterruptionBegan | Event::RemotePause) => (
            Session {
                state: PausedFromEmitting,
                ..session.clone()
            },
            vec![PauseEmission, Publish],
        ),
        (Capturing, Event::InterruptionBegan | Event::RemotePause) => (
            Session {
                state: PausedFromCapturing,
                ..session.clone()
            },
            vec![PauseCapture, Publish],
        ),
        (
            PausedFromEmitting,
            Event::InterruptionEnded {
                should_resume: true,
            }
            | Event::RemotePlay,
        ) => (
            Session {
                state: Emitting,
                ..session.clone()
            },
            vec![ResumeEmission, Publish],
        ),
        (
            PausedFromCapturing,
            Event::InterruptionEnded {
                should_resume: true,
            }
            | Event::RemotePlay,
        ) => (
            Session {
                state: Capturing,
                ..session.clone()
            },
            vec![ResumeCapture, Publish],
        ),
        (Idle, Event::InterruptionEnded { .. }) => (session.clone(), vec![]),
        (
            _,
            Event::InterruptionEnded {
                should_resume: false,
            },
        ) => stop_cycle(),

        // -----------------
        // Capability failures
        // -----------------
        (Idle, Event::CapabilityFailed { .. }) => (session.clone(), vec![]),
        (_, Event::CapabilityFailed { track }) => {
            log::warn!("{} unavailable, ending cycle", track);
            stop_cycle()
        }

        // -----------------
        // Unhandled: no transition
        // -----------------
        (state, event) => {
            log::debug!(
                "{}",
                SessionError::InconsistentTransition {
                    state,
                    event: format!("{:?}", event),
                }
            );
            (session.clone(), vec![])
        }
    }
}

/// Back to `Idle`: both tracks and the clock are stopped, counters are cleared.
fn stop_cycle() -> (Session, Vec<Effect>) {
    use Effect::*;
    (
        Session::default(),
        vec![StopEmission, StopCapture, StopTickClock, Publish],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(state: SessionState, emission: u64, capture: u64) -> Session {
        Session {
            state,
            emission_remaining: emission,
            capture_remaining: capture,
            cycle_id: if state == SessionState::Idle {
                None
            } else {
                Some(Uuid::new_v4())
            },
        }
    }

    fn toggle(sound_secs: u64, capture_secs: u64) -> Event {
        Event::Toggle {
            sound_secs,
            capture_secs,
            durations_changed: false,
        }
    }

    const ALL_STATES: [SessionState; 5] = [
        SessionState::Idle,
        SessionState::Emitting,
        SessionState::Capturing,
        SessionState::PausedFromEmitting,
        SessionState::PausedFromCapturing,
    ];

    #[test]
    fn idle_toggle_with_both_off_stays_idle_without_effects() {
        let (next, effects) = reduce(&Session::default(), toggle(0, 0));
        assert_eq!(next, Session::default());
        assert!(effects.is_empty());
    }

    #[test]
    fn idle_toggle_starts_cycle() {
        let (next, effects) = reduce(&Session::default(), toggle(60, 60));
        assert_eq!(next.state, SessionState::Emitting);
        assert_eq!(next.emission_remaining, 60);
        assert_eq!(next.capture_remaining, 60);
        let cycle_id = next.cycle_id.expect("cycle id assigned");
        assert_eq!(
            effects,
            vec![
                Effect::StartTickClock { cycle_id },
                Effect::StartEmission,
                Effect::Publish
            ]
        );
    }

    #[test]
    fn each_new_cycle_gets_a_fresh_id() {
        let (first, _) = reduce(&Session::default(), toggle(60, 60));
        let (second, _) = reduce(&Session::default(), toggle(60, 60));
        assert_ne!(first.cycle_id, second.cycle_id);
    }

    #[test]
    fn toggle_pauses_and_resumes_each_phase() {
        let cases = [
            (
                SessionState::Emitting,
                SessionState::PausedFromEmitting,
                Effect::PauseEmission,
            ),
            (
                SessionState::PausedFromEmitting,
                SessionState::Emitting,
                Effect::ResumeEmission,
            ),
            (
                SessionState::Capturing,
                SessionState::PausedFromCapturing,
                Effect::PauseCapture,
            ),
            (
                SessionState::PausedFromCapturing,
                SessionState::Capturing,
                Effect::ResumeCapture,
            ),
        ];
        for (from, to, effect) in cases {
            let current = session(from, 30, 40);
            // Arguments are ignored once a cycle is running
            let (next, effects) = reduce(&current, toggle(0, 0));
            assert_eq!(next.state, to, "toggle from {:?}", from);
            assert_eq!(next.emission_remaining, 30);
            assert_eq!(next.capture_remaining, 40);
            assert_eq!(next.cycle_id, current.cycle_id);
            assert_eq!(effects, vec![effect, Effect::Publish]);
        }
    }

    #[test]
    fn toggle_with_changed_durations_reloads_counters() {
        let current = session(SessionState::PausedFromEmitting, 12, 40);
        let (next, effects) = reduce(
            &current,
            Event::Toggle {
                sound_secs: 300,
                capture_secs: 3600,
                durations_changed: true,
            },
        );
        assert_eq!(next.state, SessionState::Emitting);
        assert_eq!(next.emission_remaining, 300);
        assert_eq!(next.capture_remaining, 3600);
        assert_eq!(effects, vec![Effect::ResumeEmission, Effect::Publish]);
    }

    #[test]
    fn emitting_tick_decrements_counter() {
        let (next, effects) = reduce(&session(SessionState::Emitting, 5, 9), Event::Tick);
        assert_eq!(next.state, SessionState::Emitting);
        assert_eq!(next.emission_remaining, 4);
        assert_eq!(next.capture_remaining, 9);
        assert_eq!(effects, vec![Effect::Publish]);
    }

    #[test]
    fn emission_expiry_switches_to_capture() {
        let current = session(SessionState::Emitting, 1, 9);
        let (next, effects) = reduce(&current, Event::Tick);
        assert_eq!(next.state, SessionState::Capturing);
        assert_eq!(next.emission_remaining, 0);
        assert_eq!(next.capture_remaining, 9);
        assert_eq!(next.cycle_id, current.cycle_id);
        assert_eq!(
            effects,
            vec![Effect::StopEmission, Effect::StartCapture, Effect::Publish]
        );
    }

    #[test]
    fn capture_expiry_returns_to_idle() {
        let (next, effects) = reduce(&session(SessionState::Capturing, 0, 1), Event::Tick);
        assert_eq!(next, Session::default());
        assert_eq!(
            effects,
            vec![Effect::StopCapture, Effect::StopTickClock, Effect::Publish]
        );
    }

    #[test]
    fn zero_length_phase_expires_on_next_tick() {
        let (emitting, _) = reduce(&Session::default(), toggle(0, 60));
        assert_eq!(emitting.state, SessionState::Emitting);
        assert_eq!(emitting.emission_remaining, 0);

        let (capturing, _) = reduce(&emitting, Event::Tick);
        assert_eq!(capturing.state, SessionState::Capturing);
        assert_eq!(capturing.capture_remaining, 60);
    }

    #[test]
    fn zero_length_capture_ends_cycle_one_tick_after_emission() {
        let current = session(SessionState::Emitting, 1, 0);
        let (capturing, _) = reduce(&current, Event::Tick);
        assert_eq!(capturing.state, SessionState::Capturing);
        let (idle, effects) = reduce(&capturing, Event::Tick);
        assert_eq!(idle.state, SessionState::Idle);
        assert!(effects.contains(&Effect::StopTickClock));
    }

    #[test]
    fn ticks_are_ignored_while_paused_or_idle() {
        for state in [
            SessionState::Idle,
            SessionState::PausedFromEmitting,
            SessionState::PausedFromCapturing,
        ] {
            let current = session(state, 7, 8);
            let mut next = current.clone();
            for _ in 0..5 {
                let (after, effects) = reduce(&next, Event::Tick);
                assert!(effects.is_empty());
                next = after;
            }
            assert_eq!(next, current);
        }
    }

    #[test]
    fn interruption_began_pauses_active_phase() {
        let (next, effects) = reduce(
            &session(SessionState::Emitting, 10, 10),
            Event::InterruptionBegan,
        );
        assert_eq!(next.state, SessionState::PausedFromEmitting);
        assert_eq!(effects, vec![Effect::PauseEmission, Effect::Publish]);

        let (next, effects) = reduce(
            &session(SessionState::Capturing, 0, 10),
            Event::InterruptionBegan,
        );
        assert_eq!(next.state, SessionState::PausedFromCapturing);
        assert_eq!(effects, vec![Effect::PauseCapture, Effect::Publish]);
    }

    #[test]
    fn interruption_began_is_noop_when_not_active() {
        for state in [
            SessionState::Idle,
            SessionState::PausedFromEmitting,
            SessionState::PausedFromCapturing,
        ] {
            let current = session(state, 3, 3);
            let (next, effects) = reduce(&current, Event::InterruptionBegan);
            assert_eq!(next, current);
            assert!(effects.is_empty());
        }
    }

    #[test]
    fn interruption_ended_with_resume_restores_phase() {
        let current = session(SessionState::PausedFromCapturing, 0, 22);
        let (next, effects) = reduce(
            &current,
            Event::InterruptionEnded {
                should_resume: true,
            },
        );
        assert_eq!(next.state, SessionState::Capturing);
        assert_eq!(next.capture_remaining, 22);
        assert_eq!(effects, vec![Effect::ResumeCapture, Effect::Publish]);
    }

    #[test]
    fn interruption_ended_without_resume_stops_cycle() {
        for state in [
            SessionState::PausedFromEmitting,
            SessionState::PausedFromCapturing,
            SessionState::Emitting,
            SessionState::Capturing,
        ] {
            let (next, effects) = reduce(
                &session(state, 5, 5),
                Event::InterruptionEnded {
                    should_resume: false,
                },
            );
            assert_eq!(next, Session::default(), "from {:?}", state);
            assert_eq!(
                effects,
                vec![
                    Effect::StopEmission,
                    Effect::StopCapture,
                    Effect::StopTickClock,
                    Effect::Publish
                ]
            );
        }
    }

    #[test]
    fn interruption_ended_while_idle_is_idempotent() {
        for should_resume in [true, false] {
            let (next, effects) =
                reduce(&Session::default(), Event::InterruptionEnded { should_resume });
            assert_eq!(next, Session::default());
            assert!(effects.is_empty());
        }
    }

    #[test]
    fn remote_intents_mirror_pause_and_resume() {
        let (paused, effects) = reduce(&session(SessionState::Capturing, 0, 4), Event::RemotePause);
        assert_eq!(paused.state, SessionState::PausedFromCapturing);
        assert_eq!(effects, vec![Effect::PauseCapture, Effect::Publish]);

        let (resumed, effects) = reduce(&paused, Event::RemotePlay);
        assert_eq!(resumed.state, SessionState::Capturing);
        assert_eq!(effects, vec![Effect::ResumeCapture, Effect::Publish]);
    }

    #[test]
    fn remote_intents_in_wrong_state_change_nothing() {
        let cases = [
            (SessionState::Idle, Event::RemotePause),
            (SessionState::Idle, Event::RemotePlay),
            (SessionState::Emitting, Event::RemotePlay),
            (SessionState::PausedFromEmitting, Event::RemotePause),
        ];
        for (state, event) in cases {
            let current = session(state, 2, 2);
            let (next, effects) = reduce(&current, event);
            assert_eq!(next, current);
            assert!(effects.is_empty());
        }
    }

    #[test]
    fn capability_failure_forces_idle_from_any_running_state() {
        for state in ALL_STATES {
            let (next, effects) = reduce(
                &session(state, 5, 5),
                Event::CapabilityFailed {
                    track: Track::Capture,
                },
            );
            assert_eq!(next.state, SessionState::Idle);
            if state == SessionState::Idle {
                assert!(effects.is_empty());
            } else {
                assert!(effects.contains(&Effect::StopTickClock));
            }
        }
    }

    #[test]
    fn reducer_matches_transition_table() {
        use SessionState::*;

        let events = [
            toggle(0, 0),
            toggle(60, 0),
            Event::Tick,
            Event::InterruptionBegan,
            Event::InterruptionEnded {
                should_resume: true,
            },
            Event::InterruptionEnded {
                should_resume: false,
            },
            Event::RemotePause,
            Event::RemotePlay,
            Event::CapabilityFailed {
                track: Track::Emission,
            },
        ];
        // One row per state, one column per event above
        let table: [(SessionState, [SessionState; 9]); 5] = [
            (
                Idle,
                [Idle, Emitting, Idle, Idle, Idle, Idle, Idle, Idle, Idle],
            ),
            (
                Emitting,
                [
                    PausedFromEmitting,
                    PausedFromEmitting,
                    Emitting,
                    PausedFromEmitting,
                    Emitting,
                    Idle,
                    PausedFromEmitting,
                    Emitting,
                    Idle,
                ],
            ),
            (
                Capturing,
                [
                    PausedFromCapturing,
                    PausedFromCapturing,
                    Capturing,
                    PausedFromCapturing,
                    Capturing,
                    Idle,
                    PausedFromCapturing,
                    Capturing,
                    Idle,
                ],
            ),
            (
                PausedFromEmitting,
                [
                    Emitting,
                    Emitting,
                    PausedFromEmitting,
                    PausedFromEmitting,
                    Emitting,
                    Idle,
                    PausedFromEmitting,
                    Emitting,
                    Idle,
                ],
            ),
            (
                PausedFromCapturing,
                [
                    Capturing,
                    Capturing,
                    PausedFromCapturing,
                    PausedFromCapturing,
                    Capturing,
                    Idle,
                    PausedFromCapturing,
                    Capturing,
                    Idle,
                ],
            ),
        ];

        for (state, expected_row) in table {
            for (event, expected) in events.iter().cloned().zip(expected_row) {
                let current = session(state, 3, 3);
                let (next, effects) = reduce(&current, event.clone());
                assert_eq!(next.state, expected, "{:?} + {:?}", state, event);
                if state != Idle && next.state == Idle {
                    assert_eq!(next, Session::default(), "{:?} + {:?}", state, event);
                }
                // A transition that changes nothing issues no effects
                if next == current {
                    assert!(effects.is_empty(), "{:?} + {:?}", state, event);
                }
            }
        }
    }

    #[test]
    fn effects_map_to_media_calls() {
        assert_eq!(
            Effect::ResumeCapture.media_call(),
            Some((Track::Capture, MediaOp::Resume))
        );
        assert_eq!(Effect::Publish.media_call(), None);
        assert_eq!(Effect::StopTickClock.media_call(), None);
    }

    #[test]
    fn snapshot_serializes_with_status_tag() {
        let snapshot = SessionSnapshot::from(&session(SessionState::PausedFromEmitting, 59, 60));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "pausedFromEmitting");
        assert_eq!(json["label"], "Playing paused");
        assert_eq!(json["emissionRemainingSecs"], 59);
        assert_eq!(json["captureRemainingSecs"], 60);
    }
}
