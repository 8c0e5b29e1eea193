//! Pause detection from heartbeat silence
//!
//! The host has no reliable pause event. While a level is running the hands
//! update fires every frame; when it stops for longer than the threshold the
//! game is assumed paused. Frame stalls longer than the threshold produce a
//! false positive that the next heartbeat undoes.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::game::{GameEvent, GameState};
use crate::session::SessionContext;
use crate::shutdown::ShutdownSignal;

pub const DEFAULT_PAUSE_THRESHOLD: Duration = Duration::from_millis(500);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct PauseWatcher {
    threshold: Duration,
    interval: Duration,
}

impl Default for PauseWatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PAUSE_THRESHOLD, DEFAULT_POLL_INTERVAL)
    }
}

impl PauseWatcher {
    pub fn new(threshold: Duration, interval: Duration) -> Self {
        Self {
            threshold,
            interval,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One watcher tick. Returns the new state if it paused the game.
    pub fn poll(&self, ctx: &SessionContext) -> Option<GameState> {
        if ctx.state() != GameState::InGame {
            return None;
        }
        let silence = ctx.millis_since_heartbeat()?;
        if silence <= self.threshold.as_millis() as u64 {
            return None;
        }

        debug!("No heartbeat for {} ms", silence);
        let state = ctx.apply(GameEvent::HeartbeatTimeout);
        (state == GameState::Paused).then_some(state)
    }

    /// Run the watcher on its own thread until `shutdown` fires.
    pub fn spawn(
        self,
        ctx: Arc<SessionContext>,
        shutdown: Arc<ShutdownSignal>,
    ) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("pause-watcher".to_string())
            .spawn(move || {
                info!(
                    "Pause watcher started (threshold {} ms, interval {} ms)",
                    self.threshold.as_millis(),
                    self.interval.as_millis()
                );
                while !shutdown.wait(self.interval) {
                    self.poll(&ctx);
                }
                debug!("Pause watcher stopped");
            })
    }
}
