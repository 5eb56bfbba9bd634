//! Connection handler for individual client connections.
//!
//! Each accepted connection gets its own `ConnectionHandler` task that:
//! - Reads the handshake record and registers a session
//! - Tags, timestamps and publishes every inbound record
//! - Removes its session when the connection ends
//!
//! ```text
//! Handshaking ──ok──▶ Active ──read error / closed──▶ Closing ──▶ Terminated
//!      │
//!      └──empty or reserved name / error / timeout──▶ dropped (no session, no notice)
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in graceful disconnect

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parlor_protocol::{read_message, ChatMessage, WireError, SYSTEM_SENDER};

use crate::queue::Publisher;
use crate::registry::{ConnReader, ConnWriter, Registry, RemovalReason, Session, SessionId};

/// Everything a connection handler shares with the rest of the server.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Registry the session joins after its handshake
    pub registry: Arc<Registry>,

    /// Queues inbound messages are published to
    pub publisher: Publisher,

    /// Cancelled when the server closes every remaining connection
    pub connections: CancellationToken,

    /// Maximum wait for the handshake record
    pub handshake_timeout: Duration,
}

/// Connection handler for a single client.
pub struct ConnectionHandler {
    id: SessionId,
    reader: ConnReader,
    writer: ConnWriter,
    context: ConnectionContext,
}

impl ConnectionHandler {
    pub fn new(
        id: SessionId,
        reader: ConnReader,
        writer: ConnWriter,
        context: ConnectionContext,
    ) -> Self {
        Self {
            id,
            reader,
            writer,
            context,
        }
    }

    /// Runs the connection to completion.
    ///
    /// Returns once the connection is closed and, if a session was
    /// registered, the session has been removed.
    pub async fn run(self) {
        let Self {
            id,
            mut reader,
            writer,
            context,
        } = self;

        debug!(client = %id, "New client connected");

        let identity = match handshake(&mut reader, &context).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(client = %id, error = %e, "Handshake failed");
                return;
            }
        };

        let session = Arc::new(Session::new(
            id,
            identity,
            writer,
            context.connections.child_token(),
        ));
        context.registry.add(Arc::clone(&session)).await;
        context
            .publisher
            .publish(ChatMessage::system(format!("{} joined", session.identity())));

        info!(client = %id, identity = %session.identity(), "Client joined");

        let ended = receive_loop(&mut reader, &session, &context.publisher).await;
        debug!(client = %id, reason = %ended, "Receive loop ended");

        let reason = if context.connections.is_cancelled() {
            RemovalReason::Shutdown
        } else {
            RemovalReason::Disconnected
        };
        context.registry.remove(&session, reason).await;

        info!(client = %id, identity = %session.identity(), "Client disconnected");
    }
}

/// Reads the handshake record and returns the declared identity.
async fn handshake(
    reader: &mut ConnReader,
    context: &ConnectionContext,
) -> Result<String, ConnectionError> {
    let msg = tokio::select! {
        biased;

        _ = context.connections.cancelled() => return Err(ConnectionError::Cancelled),

        result = timeout(context.handshake_timeout, read_message(reader)) => match result {
            Ok(msg) => msg?,
            Err(_) => return Err(ConnectionError::HandshakeTimeout(context.handshake_timeout)),
        },
    };

    let identity = msg.sender().trim();
    if identity.is_empty() {
        return Err(ConnectionError::EmptyIdentity);
    }
    // Notices are recognized by their sender alone.
    if identity == SYSTEM_SENDER {
        return Err(ConnectionError::ReservedIdentity(identity.to_string()));
    }
    Ok(identity.to_string())
}

/// Publishes inbound records until the connection fails or is closed.
///
/// Returns why the loop ended.
async fn receive_loop(
    reader: &mut ConnReader,
    session: &Session,
    publisher: &Publisher,
) -> ConnectionError {
    loop {
        let msg = tokio::select! {
            biased;

            _ = session.closed() => return ConnectionError::Cancelled,

            result = read_message(reader) => match result {
                Ok(msg) => msg,
                Err(e) => return e.into(),
            },
        };

        // Never trust the sender field past the handshake.
        let text = msg.text().trim().to_string();
        let msg = msg.with_text(text).attributed_to(session.identity());
        session.touch();

        debug!(
            client = %session.id(),
            target = %msg.target(),
            len = msg.text().len(),
            "Received message"
        );
        publisher.publish(msg);
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("Handshake declared an empty identity")]
    EmptyIdentity,

    #[error("Handshake declared the reserved identity {0:?}")]
    ReservedIdentity(String),

    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Connection closed by server")]
    Cancelled,
}
