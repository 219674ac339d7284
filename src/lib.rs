pub mod catalog;
pub mod clock;
mod console;
pub mod controller;
pub mod error;
pub mod media;
pub mod settings;
pub mod signals;
pub mod state_machine;

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

pub use catalog::{DurationCatalog, PhaseDuration};
pub use controller::{Selection, SessionController};
pub use error::SessionError;
pub use media::{MediaError, MediaOp, MediaPort, SimulatedMediaPort, Track};
pub use settings::SessionSettings;
pub use signals::HostSignal;
pub use state_machine::{HandledResult, SessionSnapshot, SessionState};

use clock::{ClockTick, IntervalTickClock};

/// Requests marshaled onto the session loop.
enum Command {
    Toggle {
        selection: Selection,
        reply: oneshot::Sender<Result<SessionState, SessionError>>,
    },
    InterruptionBegan {
        reply: oneshot::Sender<()>,
    },
    InterruptionEnded {
        should_resume: bool,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    RemotePause {
        reply: oneshot::Sender<HandledResult>,
    },
    RemotePlay {
        reply: oneshot::Sender<HandledResult>,
    },
    CapabilityFailed {
        track: Track,
        error: MediaError,
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Cloneable handle to a running session loop.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| SessionError::LoopClosed)?;
        rx.await.map_err(|_| SessionError::LoopClosed)
    }

    pub async fn toggle(
        &self,
        sound_index: usize,
        capture_index: usize,
    ) -> Result<SessionState, SessionError> {
        self.toggle_with(Selection::new(sound_index, capture_index))
            .await
    }

    pub async fn toggle_with(&self, selection: Selection) -> Result<SessionState, SessionError> {
        self.request(|reply| Command::Toggle { selection, reply })
            .await?
    }

    pub async fn interruption_began(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::InterruptionBegan { reply })
            .await
    }

    pub async fn interruption_ended(&self, should_resume: bool) -> Result<(), SessionError> {
        self.request(|reply| Command::InterruptionEnded {
            should_resume,
            reply,
        })
        .await?
    }

    pub async fn remote_pause_intent(&self) -> Result<HandledResult, SessionError> {
        self.request(|reply| Command::RemotePause { reply }).await
    }

    pub async fn remote_play_intent(&self) -> Result<HandledResult, SessionError> {
        self.request(|reply| Command::RemotePlay { reply }).await
    }

    /// Report a deferred acquisition failure; the session ends its cycle.
    pub async fn capability_failed(
        &self,
        track: Track,
        error: MediaError,
    ) -> Result<(), SessionError> {
        self.request(|reply| Command::CapabilityFailed {
            track,
            error,
            reply,
        })
        .await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Ask the loop to stop. Pending commands queued before this one are still applied.
    pub async fn shutdown(&self) {
        if self.tx.send(Command::Shutdown).await.is_err() {
            log::debug!("Shutdown requested but session loop already ended");
        }
    }
}

/// Start a session loop on the current tokio runtime.
pub fn spawn_session(
    catalog: DurationCatalog,
    media: Box<dyn MediaPort>,
    tick_period: Duration,
) -> (SessionHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<Command>(32);
    let (tick_tx, tick_rx) = mpsc::channel::<ClockTick>(8);

    let clock = IntervalTickClock::new(tick_period, tick_tx);
    let controller = SessionController::new(catalog, media, Box::new(clock));
    let snapshots = controller.subscribe();

    let task = tokio::spawn(run_session_loop(controller, rx, tick_rx));
    (SessionHandle { tx, snapshots }, task)
}

/// Run the session loop. Commands and clock ticks are applied one at a time.
async fn run_session_loop(
    mut controller: SessionController,
    mut commands: mpsc::Receiver<Command>,
    mut ticks: mpsc::Receiver<ClockTick>,
) {
    log::info!("Session loop started");

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    log::debug!("All session handles dropped");
                    break;
                };
                if !handle_command(&mut controller, command) {
                    log::info!("Shutdown requested, stopping session loop");
                    break;
                }
            }
            Some(tick) = ticks.recv() => {
                if controller.cycle_id() != Some(tick.cycle_id) {
                    log::debug!("Dropping stale tick for cycle {}", tick.cycle_id);
                    continue;
                }
                if let Err(e) = controller.tick() {
                    log::error!("Tick failed: {}", e);
                }
            }
        }
    }

    // Leave the device in a clean state
    if controller.state() != SessionState::Idle {
        let _ = controller.interruption_ended(false);
    }
    log::info!("Session loop ended");
}

/// Apply one command. Returns `false` when the loop should stop.
fn handle_command(controller: &mut SessionController, command: Command) -> bool {
    // Replies are ignored if the caller stopped waiting
    match command {
        Command::Toggle { selection, reply } => {
            let _ = reply.send(controller.toggle_with(selection));
        }
        Command::InterruptionBegan { reply } => {
            controller.interruption_began();
            let _ = reply.send(());
        }
        Command::InterruptionEnded {
            should_resume,
            reply,
        } => {
            let _ = reply.send(controller.interruption_ended(should_resume));
        }
        Command::RemotePause { reply } => {
            let _ = reply.send(controller.remote_pause_intent());
        }
        Command::RemotePlay { reply } => {
            let _ = reply.send(controller.remote_play_intent());
        }
        Command::CapabilityFailed {
            track,
            error,
            reply,
        } => {
            controller.capability_failed(track, error);
            let _ = reply.send(());
        }
        Command::Shutdown => return false,
    }
    true
}

// ============================================================================
// Application entry point
// ============================================================================

fn init_logging() {
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

/// Print every published snapshot as one JSON line for the presentation layer.
async fn print_snapshots(mut rx: watch::Receiver<SessionSnapshot>) {
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        match serde_json::to_string(&snapshot) {
            Ok(json) => println!("{}", json),
            Err(e) => log::warn!("Failed to serialize snapshot: {}", e),
        }
    }
}

async fn run_host(settings: SessionSettings) -> std::io::Result<()> {
    if settings.is_accelerated() {
        log::warn!(
            "tick_interval_ms is {}: each countdown second lasts {:?}, not {:?}",
            settings.tick_interval_ms,
            settings.tick_period(),
            clock::TICK_PERIOD
        );
    }
    let catalog = settings.catalog();
    let media = SimulatedMediaPort::new(
        settings.emission_source.as_str(),
        settings.capture_target.as_str(),
    )
    .deny_capture(settings.simulate_capture_denied);

    let (handle, session_task) =
        spawn_session(catalog.clone(), Box::new(media), settings.tick_period());

    let (signal_tx, signal_rx) = mpsc::channel::<HostSignal>(16);
    let pump = tokio::spawn(signals::pump_signals(signal_rx, handle.clone()));
    let printer = tokio::spawn(print_snapshots(handle.subscribe()));

    log::info!("Phase session started");
    let console_result = console::run_console(handle.clone(), signal_tx, &catalog).await;

    stop_host(handle, pump, session_task).await;
    if let Err(e) = printer.await {
        log::warn!("Snapshot printer task failed: {}", e);
    }
    console_result
}

/// Drain queued host signals, then stop the session loop.
///
/// The signal pump ends once every `HostSignal` sender is dropped, so it must be
/// awaited before `Shutdown` is queued behind the signals it is still delivering.
async fn stop_host(
    handle: SessionHandle,
    pump: JoinHandle<()>,
    session_task: JoinHandle<()>,
) {
    if let Err(e) = pump.await {
        log::warn!("Signal pump task failed: {}", e);
    }
    handle.shutdown().await;
    if let Err(e) = session_task.await {
        log::warn!("Session task failed: {}", e);
    }
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let settings = match settings::settings_path() {
        Ok(path) => {
            log::info!("Settings: {:?}", path);
            settings::load_or_init_settings(&path)
        }
        Err(e) => {
            log::warn!("Settings: {}", e);
            SessionSettings::default()
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_host(settings))?;
    Ok(())
}
