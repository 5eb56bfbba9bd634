//! Parlor - interactive chat client
//!
//! # Usage
//!
//! ```text
//! parlor alice                   # Join over the default Unix socket
//! parlor alice --socket ./s.sock # Join over another Unix socket
//! parlor alice --port 5555       # Join over TCP on 127.0.0.1
//! parlor alice --host chat.lan   # Join over TCP on the default port
//! ```
//!
//! Type a line to send it to everyone, or `@name text` to send it to `name`
//! only. Ctrl-D or Ctrl-C quits.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use parlor_client::{ChatClient, ClientConfig, ClientExit};
use parlor_protocol::{Transport, DEFAULT_TCP_PORT};

/// Parlor chat client
#[derive(Parser, Debug)]
#[command(name = "parlor", version, about)]
struct Args {
    /// Display name
    name: String,

    /// Connect to this Unix socket path
    #[arg(long, value_name = "PATH", conflicts_with_all = ["host", "port"])]
    socket: Option<PathBuf>,

    /// Connect over TCP to this host (default 127.0.0.1)
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Connect over TCP to this port
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,
}

impl Args {
    fn into_config(self) -> ClientConfig {
        let transport = if self.host.is_some() || self.port.is_some() {
            Transport::tcp(
                self.host.unwrap_or_else(|| "127.0.0.1".to_string()),
                self.port.unwrap_or(DEFAULT_TCP_PORT),
            )
        } else {
            self.socket.map(Transport::unix).unwrap_or_default()
        };

        ClientConfig {
            transport,
            ..ClientConfig::new(self.name)
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Diagnostics only on request; stdout carries the conversation.
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let result = runtime.block_on(run(args.into_config()));

    // Stdin reads block a runtime thread until the next newline; don't wait for it.
    runtime.shutdown_background();

    match result? {
        ClientExit::ServerClosed => {
            eprintln!("Server closed the connection.");
            process::exit(1);
        }
        ClientExit::InputClosed | ClientExit::Interrupted => Ok(()),
    }
}

async fn run(config: ClientConfig) -> Result<ClientExit> {
    let cancel_token = CancellationToken::new();

    let interrupt_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt_token.cancel();
        }
    });

    eprintln!(
        "Joining {} as {}. Type @name to whisper, Ctrl-D to quit.",
        config.transport,
        config.identity()
    );

    let client = ChatClient::new(config, cancel_token);
    client
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("Chat session failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_transport_is_unix_socket() {
        let config = Args::parse_from(["parlor", "alice"]).into_config();
        assert_eq!(config.name, "alice");
        assert_eq!(config.transport, Transport::default());
    }

    #[test]
    fn test_port_selects_tcp_on_localhost() {
        let config = Args::parse_from(["parlor", "bob", "--port", "6000"]).into_config();
        assert_eq!(config.transport, Transport::tcp("127.0.0.1", 6000));
    }

    #[test]
    fn test_host_uses_default_port() {
        let config = Args::parse_from(["parlor", "bob", "--host", "chat.lan"]).into_config();
        assert_eq!(config.transport, Transport::tcp("chat.lan", DEFAULT_TCP_PORT));
    }

    #[test]
    fn test_socket_conflicts_with_tcp() {
        assert!(Args::try_parse_from(["parlor", "bob", "--socket", "/tmp/s", "--port", "1"]).is_err());
    }

    #[test]
    fn test_name_is_required() {
        assert!(Args::try_parse_from(["parlor"]).is_err());
    }
}
