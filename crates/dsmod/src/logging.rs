//! Log file setup.
//!
//! Everything goes to one append-only file in the game's `mods` directory.
//! The logger starts at `info` before the config is read; debug lines are
//! only written once the config has enabled debug mode.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{Subscriber, error};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, reload};

pub const LOG_PATH: &str = "./mods/dualsensemod.log";

/// Filter directive for the configured verbosity
pub fn filter_directive(debug: bool) -> &'static str {
    if debug { "debug" } else { "info" }
}

pub fn banner() -> String {
    format!(
        "==== DualsenseMod v{} started {} ====",
        env!("CARGO_PKG_VERSION"),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

fn open_log(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))
}

/// Handle for changing the verbosity of the installed logger.
pub struct LogLevel(reload::Handle<EnvFilter, Registry>);

impl LogLevel {
    pub fn set_debug(&self, debug: bool) -> Result<()> {
        self.0
            .reload(EnvFilter::new(filter_directive(debug)))
            .context("Failed to change log level")
    }
}

fn build<W>(writer: W) -> (impl Subscriber + Send + Sync + 'static, LogLevel)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let (filter, handle) = reload::Layer::new(EnvFilter::new(filter_directive(false)));
    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_thread_names(true),
    );
    (subscriber, LogLevel(handle))
}

/// Install the global subscriber writing to `path`, at `info` until told
/// otherwise through the returned [`LogLevel`].
pub fn init(path: &Path) -> Result<LogLevel> {
    let mut file = open_log(path)?;
    writeln!(file, "{}", banner())?;

    let (subscriber, level) = build(Mutex::new(file));
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {e}"))?;
    Ok(level)
}

/// Log panics instead of losing them inside the host process.
pub fn set_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        error!("Panic: {}", info);
    }));
}
