//! TCP command server for dualstream
//!
//! Accepts persistent newline-delimited connections carrying the dual-format
//! command protocol. Every accepted connection runs as its own task: a parse
//! error or disconnect on one connection never reaches the accept loop or
//! any other connection.

use crate::command::{dispatch, parse_line};
use crate::manager::StreamManager;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

/// Errors that can occur when running the command server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
}

/// Run the command server on the given address
pub async fn run_command_server(
    manager: Arc<StreamManager>,
    addr: SocketAddr,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr).await?;
    info!("command server on {}", addr);
    serve(listener, manager).await
}

/// Accept loop over an already-bound listener
pub async fn serve(
    listener: TcpListener,
    manager: Arc<StreamManager>,
) -> Result<(), ServerError> {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                let manager = manager.clone();
                tokio::spawn(async move {
                    handle_client(socket, peer, manager).await;
                });
            }
            Err(e) => {
                warn!("accept failed: {}", e);
            }
        }
    }
}

/// One connection's read-parse-dispatch-respond loop
///
/// Empty lines are skipped without a response. Every processed line gets
/// exactly one terminated response line, errors included; the connection
/// stays open until the peer closes it or a read/write fails.
async fn handle_client(socket: TcpStream, peer: SocketAddr, manager: Arc<StreamManager>) {
    info!("command connect: {}", peer);
    let (reader, mut writer) = socket.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                info!("command [{}] <- {}", peer, line);

                let response = dispatch(&manager, &parse_line(line));
                let mut payload = serde_json::to_string(&response)
                    .unwrap_or_else(|_| r#"{"error":"internal error"}"#.to_string());
                payload.push('\n');

                if let Err(e) = writer.write_all(payload.as_bytes()).await {
                    warn!("command [{}] write failed: {}", peer, e);
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("command [{}] read failed: {}", peer, e);
                break;
            }
        }
    }
    info!("command disconnect: {}", peer);
}
