//! BTSW binary entry point
//!
//! Dispatches to daemon mode or one-shot commands based on CLI arguments.

use clap::Parser;
use color_eyre::eyre::Result;
use btsw::{cli::Args, cli::Command, commands, config::Config, daemon};

use std::path::Path;
use std::sync::Arc;

/// Initialize logging for one-shot commands
///
/// Logs go to stderr, filtered by `RUST_LOG` or `warn` by default. The daemon
/// uses [`daemon::init_logging`] instead.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let config_path = args.config.as_deref();

    match args.command {
        // No subcommand runs the daemon, like the plain script it replaces
        None | Some(Command::Daemon) => {
            let log_filter = daemon::init_logging();
            let config = load_config(config_path)?;
            log_filter.apply(&config.settings.log_level)?;
            daemon::run(Arc::new(config)).await
        }

        Some(Command::Validate) => {
            init_logging();
            let config = load_config(config_path)?;
            config.print_summary();
            Ok(())
        }

        Some(Command::ListSinks { json }) => {
            init_logging();
            let config = load_config(config_path).ok();
            commands::list_sinks(config.as_ref(), json)
        }

        Some(Command::Switch { sink }) => {
            init_logging();
            let config = load_config(config_path)?;
            tokio::task::spawn_blocking(move || commands::switch(&config, &sink)).await?
        }
    }
}
