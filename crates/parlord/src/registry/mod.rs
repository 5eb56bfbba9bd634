//! Registry of connected sessions.
//!
//! The registry is the single source of truth for who is connected. It is an
//! explicit object owned by the server and shared as `Arc<Registry>` with
//! every component that needs it (connection handlers, dispatcher, watchdog).
//!
//! # Locking
//!
//! One async mutex covers membership. Fan-out and the watchdog scan iterate
//! while holding it (see [`Registry::members`]), so they never observe a
//! session halfway through removal.
//!
//! # Idempotent Removal
//!
//! A session can be torn down concurrently by its own receive loop and by the
//! watchdog. [`Registry::remove`] unlinks the session and flips its `removed`
//! flag in one critical section; only the caller that gets `true` back runs
//! the teardown side effects.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, info};

use parlor_protocol::ChatMessage;

use crate::queue::Publisher;

mod reason;
mod session;

pub use reason::RemovalReason;
pub use session::{ConnReader, ConnWriter, DeliveryError, Session, SessionId};

type SessionMap = BTreeMap<SessionId, Arc<Session>>;

/// Live sessions, keyed by connection.
#[derive(Debug)]
pub struct Registry {
    sessions: Mutex<SessionMap>,
    publisher: Publisher,
}

impl Registry {
    /// Creates an empty registry publishing its notices through `publisher`.
    pub fn new(publisher: Publisher) -> Self {
        Self {
            sessions: Mutex::new(BTreeMap::new()),
            publisher,
        }
    }

    /// Adds a session.
    pub async fn add(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.lock().await;
        let id = session.id();
        let identity = session.identity().to_string();
        sessions.insert(id, session);

        info!(
            client = %id,
            identity = %identity,
            total_sessions = sessions.len(),
            "Session registered"
        );
    }

    /// Removes `session` if it is still registered.
    ///
    /// Returns `true` if this call performed the removal. In that case the
    /// connection is shut down and, when `reason` has one, a system notice is
    /// published. Returns `false` if the session was already removed; nothing
    /// else happens.
    pub async fn remove(&self, session: &Arc<Session>, reason: RemovalReason) -> bool {
        let remaining = {
            let mut sessions = self.sessions.lock().await;
            if session.is_removed() || sessions.remove(&session.id()).is_none() {
                debug!(
                    client = %session.id(),
                    reason = %reason,
                    "Session already removed"
                );
                return false;
            }
            session.mark_removed();
            sessions.len()
        };

        info!(
            client = %session.id(),
            identity = %session.identity(),
            reason = %reason,
            remaining_sessions = remaining,
            "Session removed"
        );

        session.shutdown().await;

        if let Some(text) = reason.notice(session.identity()) {
            self.publisher.publish(ChatMessage::system(text));
        }

        true
    }

    /// Locks the registry for a consistent walk over every live session.
    ///
    /// The lock is held until the returned guard is dropped; keep the walk
    /// short and never call back into the registry while holding it.
    pub async fn members(&self) -> Members<'_> {
        Members {
            sessions: self.sessions.lock().await,
        }
    }

    /// Sessions that have been idle for at least `timeout` at `now`.
    pub async fn idle_sessions(&self, now: Instant, timeout: Duration) -> Vec<Arc<Session>> {
        self.members()
            .await
            .iter()
            .filter(|session| !session.is_removed() && session.idle_for(now) >= timeout)
            .cloned()
            .collect()
    }

    /// Display names of every live session, in connection order.
    pub async fn identities(&self) -> Vec<String> {
        self.members()
            .await
            .iter()
            .map(|session| session.identity().to_string())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The queues this registry publishes notices to.
    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }
}

/// Locked view of the registry. See [`Registry::members`].
pub struct Members<'a> {
    sessions: MutexGuard<'a, SessionMap>,
}

impl Members<'_> {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Session>> {
        self.sessions.values()
    }
}
