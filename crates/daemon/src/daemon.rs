//! Daemon startup and lifecycle for dualstream
//!
//! Provides the explicit application context: built once from configuration,
//! handed by reference to the servers, torn down on shutdown. There is no
//! ambient global state.

use crate::http_server::run_http_server;
use crate::manager::StreamManager;
use crate::tcp_server::{run_command_server, ServerError};
use dualstream_config::{Config, ConfigError};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::info;

/// Error type for daemon operations
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A server failed to start or serve
    #[error("Server error: {0}")]
    Server(String),

    /// The configured listen address could not be parsed
    #[error("Invalid listen address: {0}")]
    Address(String),
}

/// Daemon state containing all runtime components
pub struct Daemon {
    /// Configuration loaded from file and environment
    pub config: Config,
    /// Registry of all camera bundles
    manager: Arc<StreamManager>,
}

impl Daemon {
    /// Build the daemon context from an already-loaded configuration
    pub fn new(config: Config) -> Self {
        let manager = Arc::new(StreamManager::new(&config));
        Self { config, manager }
    }

    /// Load configuration from file and build the daemon context
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self, DaemonError> {
        Ok(Self::new(Config::load(path)?))
    }

    /// The registry, shared with the servers and the outward-facing layer
    pub fn manager(&self) -> Arc<StreamManager> {
        self.manager.clone()
    }

    fn listen_addr(&self, port: u16) -> Result<SocketAddr, DaemonError> {
        let addr = format!("{}:{}", self.config.server.listen_host, port);
        addr.parse().map_err(|_| DaemonError::Address(addr))
    }

    /// Run the daemon until shutdown
    ///
    /// Starts every camera bundle, then serves the command protocol and the
    /// HTTP API until either server fails or ctrl-c arrives; finally stops
    /// every bundle, waiting for the supervised processes to die.
    pub async fn run(&self) -> Result<(), DaemonError> {
        let command_addr = self.listen_addr(self.config.server.command_port)?;
        let http_addr = self.listen_addr(self.config.server.http_port)?;

        self.manager.start_all();

        let command_server = tokio::spawn(run_command_server(self.manager.clone(), command_addr));
        let http_server = tokio::spawn(run_http_server(self.manager.clone(), http_addr));

        let result = tokio::select! {
            res = command_server => server_result("command server", res),
            res = http_server => server_result("http server", res),
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                Ok(())
            }
        };

        self.manager.stop_all().await;
        result
    }
}

/// Fold a server task's join and serve results into one daemon result
fn server_result(
    label: &str,
    res: Result<Result<(), ServerError>, JoinError>,
) -> Result<(), DaemonError> {
    match res {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(DaemonError::Server(format!("{} failed: {}", label, e))),
        Err(e) => Err(DaemonError::Server(format!("{} task failed: {}", label, e))),
    }
}
