//! Parlor Daemon - multi-client chat relay server
//!
//! Accepts chat clients over a Unix-domain socket (default) or TCP and relays
//! every message to all clients, or to the single client it names.
//!
//! # Usage
//!
//! ```bash
//! # Serve on the default Unix socket (/tmp/pos_chat.sock)
//! parlord
//!
//! # Serve on TCP port 5555 instead
//! parlord --port 5555
//!
//! # Evict clients idle for one minute, keep the transcript elsewhere
//! parlord --timeout 60 --log-file ./chat.log
//!
//! # Enable debug logging
//! RUST_LOG=parlord=debug parlord
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use parlor_protocol::Transport;
use parlord::config::ServerConfig;
use parlord::server::ChatServer;

/// Parlor chat relay server
#[derive(Parser, Debug)]
#[command(name = "parlord", version, about)]
struct Args {
    /// Listen on this Unix socket path
    #[arg(long, value_name = "PATH", conflicts_with = "port")]
    socket: Option<PathBuf>,

    /// Listen on this TCP port (all interfaces) instead of a Unix socket
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,

    /// Disconnect clients idle for this many seconds
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,

    /// Append the chat transcript to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let transport = match (self.socket, self.port) {
            (_, Some(port)) => Transport::tcp("0.0.0.0", port),
            (Some(path), None) => Transport::unix(path),
            (None, None) => Transport::default(),
        };

        let mut config = ServerConfig {
            transport,
            inactivity_timeout: Duration::from_secs(self.timeout),
            ..ServerConfig::default()
        };
        if let Some(path) = self.log_file {
            config.chat_log_path = path;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("parlord=info".parse()?)
                .add_directive("parlor_protocol=info".parse()?),
        )
        .init();

    let config = args.into_config();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        endpoint = %config.transport,
        timeout_secs = config.inactivity_timeout.as_secs(),
        chat_log = %config.chat_log_path.display(),
        "Parlor server starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let server = ChatServer::new(config, cancel_token);
    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e).context("Chat server failed to start");
    }

    info!("Parlor server stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_unix_socket() {
        let config = Args::parse_from(["parlord"]).into_config();
        assert_eq!(config.transport, Transport::default());
        assert_eq!(config.inactivity_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_port_selects_tcp_on_all_interfaces() {
        let config = Args::parse_from(["parlord", "--port", "6000", "--timeout", "30"]).into_config();
        assert_eq!(config.transport, Transport::tcp("0.0.0.0", 6000));
        assert_eq!(config.inactivity_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_socket_and_port_conflict() {
        let result = Args::try_parse_from(["parlord", "--socket", "/tmp/x.sock", "--port", "1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(Args::try_parse_from(["parlord", "--timeout", "0"]).is_err());
    }

    #[test]
    fn test_log_file_override() {
        let config = Args::parse_from(["parlord", "--log-file", "/var/tmp/chat.log"]).into_config();
        assert_eq!(config.chat_log_path, PathBuf::from("/var/tmp/chat.log"));
    }
}
