//! Server-side state of one connected client.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Instant};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use parlor_protocol::{write_message, ChatMessage, WireError};

/// Read half of a client connection, independent of the transport.
pub type ConnReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a client connection, independent of the transport.
pub type ConnWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Identifier of one accepted connection.
///
/// Display names may repeat across connections; this id never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Errors delivering a message to one session.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("write failed: {0}")]
    Wire(#[from] WireError),

    #[error("write timed out after {0:?}")]
    Timeout(Duration),
}

/// A connected, handshake-completed client.
///
/// # Ownership
///
/// The session's connection handler is the only reader of the connection
/// and the only writer of `last_activity`. The dispatcher writes records
/// through `writer`; the watchdog only reads `last_activity`.
///
/// `removed` flips exactly once, under the registry lock, in the same
/// critical section that unlinks the session.
pub struct Session {
    id: SessionId,
    identity: String,
    writer: tokio::sync::Mutex<ConnWriter>,
    last_activity: Mutex<Instant>,
    removed: AtomicBool,
    closed: CancellationToken,
}

impl Session {
    /// Creates a session whose receive loop stops when `closed` is cancelled.
    pub fn new(
        id: SessionId,
        identity: impl Into<String>,
        writer: ConnWriter,
        closed: CancellationToken,
    ) -> Self {
        Self {
            id,
            identity: identity.into(),
            writer: tokio::sync::Mutex::new(writer),
            last_activity: Mutex::new(Instant::now()),
            removed: AtomicBool::new(false),
            closed,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Display name declared at handshake.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Records inbound activity.
    pub fn touch(&self) {
        *self.last_activity.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time since the last inbound message, as seen at `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity())
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    pub(super) fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }

    /// Writes one record to the client, bounded by `write_timeout`.
    pub async fn deliver(
        &self,
        msg: &ChatMessage,
        write_timeout: Duration,
    ) -> Result<(), DeliveryError> {
        let mut writer = self.writer.lock().await;
        match timeout(write_timeout, write_message(&mut *writer, msg)).await {
            Ok(result) => result.map_err(DeliveryError::from),
            Err(_) => Err(DeliveryError::Timeout(write_timeout)),
        }
    }

    /// Stops the session's receive loop without touching the registry.
    ///
    /// The receive loop observes this as a connection failure and performs
    /// the canonical removal itself.
    pub fn close_connection(&self) {
        self.closed.cancel();
    }

    /// Resolves once the connection has been closed from the server side.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Closes the connection: stops the receive loop and shuts down the write half.
    pub(super) async fn shutdown(&self) {
        self.close_connection();
        let mut writer = self.writer.lock().await;
        // The peer may already be gone.
        let _ = writer.shutdown().await;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("removed", &self.is_removed())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
