//! Mod settings from the TOML file next to the game.
//!
//! ```toml
//! [app]
//! debug = true
//! pause_threshold_ms = 500
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use toml::Value;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::heartbeat::{DEFAULT_PAUSE_THRESHOLD, DEFAULT_POLL_INTERVAL};

pub const CONFIG_PATH: &str = "./mods/dualsense-mod.toml";
pub const DEFAULT_SERVICE_PATH: &str = "./mods/dualsensitive-service.exe";
pub const DEFAULT_SERVICE_PORT: u16 = 28473;

const APP_SECTION: &str = "app";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Enables debug-level log lines
    pub debug: bool,
    pub pause_threshold: Duration,
    pub poll_interval: Duration,
    /// Start the helper service when the mod loads
    pub launch_service: bool,
    pub service_path: PathBuf,
    pub service_port: u16,
    /// Signature set replacing the builtin one
    pub signatures: Option<PathBuf>,
    /// Trigger profile table replacing the builtin one
    pub profiles: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            pause_threshold: DEFAULT_PAUSE_THRESHOLD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            launch_service: true,
            service_path: PathBuf::from(DEFAULT_SERVICE_PATH),
            service_port: DEFAULT_SERVICE_PORT,
            signatures: None,
            profiles: None,
        }
    }
}

impl Config {
    /// Read and parse a config file. A missing file is an error here; see
    /// [`Config::load_or_default`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load the config, falling back to defaults when the file is absent or
    /// unreadable.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) if e.is_not_found() => {
                info!("{} not found; using config defaults...", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("Failed to read {}: {}; using config defaults...", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse TOML text. Only the `[app]` table is read (name matched without
    /// case); unknown keys are ignored and a bad value keeps its default.
    pub fn parse(content: &str) -> Result<Self> {
        let table: toml::Table = content
            .parse()
            .map_err(|e: toml::de::Error| Error::Config(e.message().to_string()))?;
        let mut config = Self::default();

        let app = table
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(APP_SECTION))
            .map(|(_, value)| value);
        match app {
            Some(Value::Table(app)) => {
                for (key, value) in app {
                    config.set(key, value);
                }
            }
            Some(other) => warn!("[{}] is a {}, not a table", APP_SECTION, other.type_str()),
            None => {}
        }
        Ok(config)
    }

    fn set(&mut self, key: &str, value: &Value) {
        match key.to_ascii_lowercase().as_str() {
            "debug" => set_parsed(key, value, Value::as_bool, &mut self.debug),
            "launch_service" => set_parsed(key, value, Value::as_bool, &mut self.launch_service),
            "pause_threshold_ms" => {
                set_parsed(key, value, parse_millis, &mut self.pause_threshold)
            }
            "poll_interval_ms" => set_parsed(key, value, parse_millis, &mut self.poll_interval),
            "service_port" => set_parsed(
                key,
                value,
                |v| v.as_integer().and_then(|port| u16::try_from(port).ok()),
                &mut self.service_port,
            ),
            "service_path" => {
                set_parsed(key, value, |v| v.as_str().map(PathBuf::from), &mut self.service_path)
            }
            "signatures" => set_parsed(key, value, optional_path, &mut self.signatures),
            "profiles" => set_parsed(key, value, optional_path, &mut self.profiles),
            _ => warn!("Unknown config key: {}", key),
        }
    }

    pub fn print(&self) {
        info!(
            "Config: [debug mode: {}, pause threshold: {} ms, poll interval: {} ms, service: {}]",
            self.debug,
            self.pause_threshold.as_millis(),
            self.poll_interval.as_millis(),
            if self.launch_service {
                self.service_path.display().to_string()
            } else {
                "disabled".to_string()
            }
        );
    }
}

fn set_parsed<T>(key: &str, value: &Value, parse: impl Fn(&Value) -> Option<T>, slot: &mut T) {
    match parse(value) {
        Some(parsed) => *slot = parsed,
        None => warn!("Invalid value for {}: {}, keeping default", key, value),
    }
}

fn parse_millis(value: &Value) -> Option<Duration> {
    value
        .as_integer()
        .and_then(|ms| u64::try_from(ms).ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// An empty string clears the override.
fn optional_path(value: &Value) -> Option<Option<PathBuf>> {
    let path = value.as_str()?;
    Some((!path.is_empty()).then(|| PathBuf::from(path)))
}
