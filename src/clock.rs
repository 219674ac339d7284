//! Start/stop-able tick clock driving the countdowns
//!
//! The clock does not touch the session itself. Each tick is sent back to the session
//! loop tagged with the cycle it was started for, so ticks still in flight after the
//! cycle ended can be dropped there.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default countdown period.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// A tick produced by a running clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    pub cycle_id: Uuid,
}

/// Periodic stimulus owned by the session controller.
pub trait TickClock: Send + 'static {
    /// Start ticking for `cycle_id`, replacing any clock already running.
    fn start(&mut self, cycle_id: Uuid);
    /// Stop ticking. Safe to call when already stopped.
    fn stop(&mut self);
    fn is_running(&self) -> bool;
}

/// Tick clock backed by a `tokio::time::interval` task.
pub struct IntervalTickClock {
    period: Duration,
    tx: mpsc::Sender<ClockTick>,
    running: Option<CancellationToken>,
}

impl IntervalTickClock {
    pub fn new(period: Duration, tx: mpsc::Sender<ClockTick>) -> Self {
        Self {
            period,
            tx,
            running: None,
        }
    }
}

impl TickClock for IntervalTickClock {
    fn start(&mut self, cycle_id: Uuid) {
        self.stop();

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = self.tx.clone();
        let period = self.period;

        tokio::spawn(async move {
            // First tick one full period after start, not immediately
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => {
                        log::debug!("Tick clock for cycle {} stopped", cycle_id);
                        break;
                    }
                    _ = interval.tick() => {
                        if tx.send(ClockTick { cycle_id }).await.is_err() {
                            log::debug!("Tick clock stopping - channel closed");
                            break;
                        }
                    }
                }
            }
        });

        log::debug!("Tick clock started for cycle {}", cycle_id);
        self.running = Some(token);
    }

    fn stop(&mut self) {
        if let Some(token) = self.running.take() {
            token.cancel();
        }
    }

    fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for IntervalTickClock {
    fn drop(&mut self) {
        self.stop();
    }
}
