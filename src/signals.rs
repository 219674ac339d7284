//! Interruption signal port
//!
//! The host owns the platform integration (audio-session interruptions, remote
//! transport commands) and forwards what it observes as [`HostSignal`]s. Signals are
//! marshaled onto the session loop through a [`SessionHandle`], so they never observe
//! a half-applied transition.

use tokio::sync::mpsc;

use crate::error::SessionError;
use crate::state_machine::HandledResult;
use crate::SessionHandle;

/// A notification from the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    /// Another app took the audio device
    InterruptionBegan,
    InterruptionEnded { should_resume: bool },
    RemotePause,
    RemotePlay,
}

/// What the session did with a delivered signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Applied,
    Remote(HandledResult),
}

/// Apply one signal to the session and wait for the outcome.
pub async fn deliver(
    handle: &SessionHandle,
    signal: HostSignal,
) -> Result<SignalOutcome, SessionError> {
    match signal {
        HostSignal::InterruptionBegan => {
            handle.interruption_began().await?;
            Ok(SignalOutcome::Applied)
        }
        HostSignal::InterruptionEnded { should_resume } => {
            handle.interruption_ended(should_resume).await?;
            Ok(SignalOutcome::Applied)
        }
        HostSignal::RemotePause => Ok(SignalOutcome::Remote(handle.remote_pause_intent().await?)),
        HostSignal::RemotePlay => Ok(SignalOutcome::Remote(handle.remote_play_intent().await?)),
    }
}

/// Forward host signals to the session until the host side hangs up.
pub async fn pump_signals(mut rx: mpsc::Receiver<HostSignal>, handle: SessionHandle) {
    log::info!("Signal pump started");

    while let Some(signal) = rx.recv().await {
        log::debug!("Host signal: {:?}", signal);
        match deliver(&handle, signal).await {
            Ok(SignalOutcome::Remote(HandledResult::NotApplicable)) => {
                log::info!("{:?}: nothing is playing or recording", signal);
            }
            Ok(SignalOutcome::Remote(HandledResult::Failed)) => {
                log::warn!("{:?}: command failed", signal);
            }
            Ok(outcome) => {
                log::debug!("{:?} -> {:?}", signal, outcome);
            }
            Err(SessionError::LoopClosed) => {
                log::info!("Session loop closed, signal pump stopping");
                break;
            }
            Err(e) => {
                log::error!("{:?} failed: {}", signal, e);
            }
        }
    }

    log::info!("Signal pump ended");
}
