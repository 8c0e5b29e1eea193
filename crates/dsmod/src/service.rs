//! Helper service launcher.
//!
//! The service owns the controller connection and listens for trigger
//! commands on a local UDP port (`service_port` in the config). Starting it
//! can take a while, so it happens on its own thread and never on a hook
//! path.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, bail};
use dsmod_core::ShutdownSignal;
use tracing::{debug, info, warn};

pub const MAX_LAUNCH_ATTEMPTS: u32 = 5;
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

#[cfg(target_os = "windows")]
const DETACHED_PROCESS: u32 = 0x0000_0008;
#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

fn spawn_service(path: &Path) -> io::Result<Child> {
    let mut command = Command::new(path);
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        command.current_dir(dir);
    }
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(DETACHED_PROCESS | CREATE_NO_WINDOW);
    }
    command.spawn()
}

/// Call `launch` until it succeeds, waiting `delay` between attempts.
///
/// Returns `Ok(None)` if shutdown was signaled.
pub fn launch_with_retry<T>(
    mut launch: impl FnMut() -> io::Result<T>,
    attempts: u32,
    delay: Duration,
    shutdown: &ShutdownSignal,
) -> Result<Option<T>> {
    let mut last_error = None;
    for attempt in 1..=attempts {
        if shutdown.is_shutdown() {
            return Ok(None);
        }
        match launch() {
            Ok(value) => return Ok(Some(value)),
            Err(e) => {
                warn!(
                    "Failed to start helper service: {}, retrying in {}s (attempt {}/{})",
                    e,
                    delay.as_secs(),
                    attempt,
                    attempts
                );
                last_error = Some(e);
            }
        }
        if attempt < attempts && shutdown.wait(delay) {
            return Ok(None);
        }
    }
    bail!(
        "Failed to start helper service after {} attempts: {}",
        attempts,
        last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string())
    )
}

/// Start the helper service in the background.
pub fn spawn_launcher(
    path: PathBuf,
    port: u16,
    shutdown: Arc<ShutdownSignal>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("service-launcher".to_string())
        .spawn(move || {
            debug!("Launching {}", path.display());
            let launched = launch_with_retry(
                || spawn_service(&path),
                MAX_LAUNCH_ATTEMPTS,
                RETRY_DELAY,
                &shutdown,
            );
            match launched {
                Ok(Some(child)) => info!(
                    "Helper service started (pid {}, port {})",
                    child.id(),
                    port
                ),
                Ok(None) => debug!("Service launch cancelled"),
                Err(e) => warn!("{:#}", e),
            }
        })
}
