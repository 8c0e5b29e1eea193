use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Command};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dsmod_core=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Check { exe, signatures } => commands::check::run(&exe, signatures.as_deref()),
        Command::Signatures { output } => commands::signatures::run(output.as_deref()),
        Command::Profiles { output, validate } => {
            commands::profiles::run(output.as_deref(), validate.as_deref())
        }
        Command::Config { path } => commands::config::run(&path),
    }
}
