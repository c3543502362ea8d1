//! CLI entry point for dualstream
//!
//! Parses command line arguments, initializes logging, and runs the daemon.

use clap::Parser;
use dualstream::Daemon;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// dualstream - always-on dual-pipeline camera stream manager
#[derive(Parser, Debug)]
#[command(name = "dualstream")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (config.toml)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG overrides the default info level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("dualstream starting, config file {}", args.config.display());

    match Daemon::from_config_file(&args.config) {
        Ok(daemon) => {
            info!(
                "managing {} camera(s); command port {}, http port {}",
                daemon.config.cameras.len(),
                daemon.config.server.command_port,
                daemon.config.server.http_port
            );

            if let Err(e) = daemon.run().await {
                error!("daemon error: {}", e);
                return ExitCode::FAILURE;
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("failed to initialize daemon: {}", e);
            ExitCode::FAILURE
        }
    }
}
