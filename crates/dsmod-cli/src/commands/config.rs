//! Config command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use dsmod_core::Config;

/// Run the config command
pub fn run(path: &Path) -> Result<()> {
    let config = if path.exists() {
        Config::load(path).with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        eprintln!("{} not found, showing defaults", path.display());
        Config::default()
    };

    let optional = |p: &Option<std::path::PathBuf>| {
        p.as_ref()
            .map(|p| format!("{:?}", p.display().to_string()))
            .unwrap_or_else(|| "\"\"  # builtin".to_string())
    };

    println!("[app]");
    println!("debug              = {}", config.debug);
    println!("pause_threshold_ms = {}", config.pause_threshold.as_millis());
    println!("poll_interval_ms   = {}", config.poll_interval.as_millis());
    println!("launch_service     = {}", config.launch_service);
    println!("service_path       = {:?}", config.service_path.display().to_string());
    println!("service_port       = {}", config.service_port);
    println!("signatures         = {}", optional(&config.signatures));
    println!("profiles           = {}", optional(&config.profiles));
    Ok(())
}
