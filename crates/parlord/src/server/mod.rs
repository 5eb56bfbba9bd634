//! Chat server: listener, connection tasks and lifecycle.
//!
//! Startup spawns the chat logger, dispatcher and watchdog before the first
//! connection is accepted. Shutdown runs in a fixed order:
//!
//! 1. Stop accepting and remove the Unix socket file
//! 2. Close both queues; dispatcher and logger drain what is left
//! 3. Join the watchdog
//! 4. Close every remaining connection and join the connection tasks
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Task failures are logged and never abort shutdown

mod connection;
mod listener;

pub use connection::{ConnectionContext, ConnectionError, ConnectionHandler};
pub use listener::Listener;

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::chatlog::spawn_chat_logger;
use crate::config::ServerConfig;
use crate::dispatcher::spawn_dispatcher;
use crate::queue::Publisher;
use crate::registry::{Registry, SessionId};
use crate::watchdog::spawn_watchdog;

/// Server startup errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to set up transport {endpoint}: {error}")]
    TransportSetup { endpoint: String, error: String },
}

/// The chat server.
///
/// Owns the registry and the publisher shared by every task.
pub struct ChatServer {
    config: ServerConfig,
    registry: Arc<Registry>,
    publisher: Publisher,
    cancel_token: CancellationToken,
}

impl ChatServer {
    /// Creates a server that shuts down when `cancel_token` is cancelled.
    pub fn new(config: ServerConfig, cancel_token: CancellationToken) -> Self {
        let publisher = Publisher::new();
        let registry = Arc::new(Registry::new(publisher.clone()));
        Self {
            config,
            registry,
            publisher,
            cancel_token,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Binds the configured transport and serves until cancelled.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = Listener::bind(&self.config.transport).await?;
        self.serve(listener).await;
        Ok(())
    }

    /// Serves on an already bound listener until cancelled.
    pub async fn serve(&self, listener: Listener) {
        match listener.local_transport() {
            Ok(endpoint) => info!(endpoint = %endpoint, "Chat server listening"),
            Err(e) => info!(error = %e, "Chat server listening on unknown endpoint"),
        }

        let chat_logger = spawn_chat_logger(
            Arc::clone(self.publisher.log_queue()),
            self.config.chat_log_path.clone(),
        );
        let dispatcher = spawn_dispatcher(
            Arc::clone(self.publisher.dispatch_queue()),
            Arc::clone(&self.registry),
            self.config.write_timeout,
        );
        let watchdog = spawn_watchdog(
            Arc::clone(&self.registry),
            self.config.inactivity_timeout,
            self.config.watchdog_interval,
            self.cancel_token.clone(),
        );

        let connections = CancellationToken::new();
        let tracker = TaskTracker::new();
        let accept_loop = AcceptLoop {
            listener,
            context: ConnectionContext {
                registry: Arc::clone(&self.registry),
                publisher: self.publisher.clone(),
                connections: connections.clone(),
                handshake_timeout: self.config.handshake_timeout(),
            },
            tracker: tracker.clone(),
            cancel_token: self.cancel_token.clone(),
        };
        let acceptor = tokio::spawn(accept_loop.run());

        self.cancel_token.cancelled().await;
        info!("Server shutdown requested");

        if let Err(e) = acceptor.await {
            error!(error = %e, "Accept loop task failed");
        }

        self.publisher.close();
        if let Err(e) = dispatcher.await {
            error!(error = %e, "Dispatcher task failed");
        }
        match chat_logger.await {
            Ok(Ok(())) => {}
            // Already reported by the logger itself.
            Ok(Err(_)) => {}
            Err(e) => error!(error = %e, "Chat logger task failed"),
        }
        if let Err(e) = watchdog.await {
            error!(error = %e, "Watchdog task failed");
        }

        let remaining = self.registry.len().await;
        debug!(remaining, "Closing remaining connections");
        connections.cancel();
        tracker.close();
        tracker.wait().await;

        info!("Server shutdown complete");
    }
}

/// Accepts connections and spawns one handler task per client.
struct AcceptLoop {
    listener: Listener,
    context: ConnectionContext,
    tracker: TaskTracker,
    cancel_token: CancellationToken,
}

impl AcceptLoop {
    async fn run(self) {
        let mut next_id: u64 = 0;

        loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => {
                    info!("Accept loop stopping");
                    break;
                }

                result = self.listener.accept() => match result {
                    Ok((reader, writer, peer)) => {
                        next_id += 1;
                        let id = SessionId::new(next_id);
                        debug!(client = %id, peer = %peer, "Accepted connection");

                        let handler = ConnectionHandler::new(id, reader, writer, self.context.clone());
                        self.tracker.spawn(handler.run());
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
            }
        }

        self.listener.close();
    }
}
