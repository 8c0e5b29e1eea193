//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dsmod-check")]
#[command(about = "Offline tooling for DualsenseMod", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check whether a game executable carries every hooked function
    Check {
        /// Path to the game executable
        exe: PathBuf,

        /// Signature set to check instead of the builtin one
        #[arg(short, long)]
        signatures: Option<PathBuf>,
    },

    /// Dump the builtin signature set as JSON
    Signatures {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Dump or validate trigger profiles
    Profiles {
        /// Write the builtin table to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Validate a profile table instead of dumping the builtin one
        #[arg(long, conflicts_with = "output")]
        validate: Option<PathBuf>,
    },

    /// Show the effective mod configuration
    Config {
        /// Path to the config file
        #[arg(default_value = dsmod_core::CONFIG_PATH)]
        path: PathBuf,
    },
}
