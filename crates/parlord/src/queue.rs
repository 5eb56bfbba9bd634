//! Closable, unbounded FIFO hand-off queue.
//!
//! Producers (connection handlers, the registry's notices) never block:
//! the queue has no capacity bound, trading memory under a slow consumer for
//! simplicity. Consumers suspend in [`MessageQueue::pop`] until a message
//! arrives or the queue is closed and drained.
//!
//! # Panic-Free Guarantees
//!
//! The state mutex is never held across an `.await`, and a poisoned lock is
//! recovered with `PoisonError::into_inner` since the state stays consistent
//! after every critical section.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::trace;

use parlor_protocol::ChatMessage;

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<ChatMessage>,
    closed: bool,
}

/// Blocking message queue.
///
/// Safe for any number of concurrent pushers and poppers.
#[derive(Debug, Default)]
pub struct MessageQueue {
    state: Mutex<QueueState>,
    available: Notify,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `msg` to the tail and wakes one waiting popper.
    ///
    /// Silently drops the message if the queue is closed.
    pub fn push(&self, msg: ChatMessage) {
        {
            let mut state = self.state();
            if state.closed {
                trace!(sender = %msg.sender(), "Queue closed, dropping message");
                return;
            }
            state.items.push_back(msg);
        }
        self.available.notify_one();
    }

    /// Removes and returns the head of the queue.
    ///
    /// Waits while the queue is open and empty. Returns `None` once the
    /// queue is closed and every queued message has been popped.
    pub async fn pop(&self) -> Option<ChatMessage> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before inspecting state so a close() or push() that
            // lands between the check and the await still wakes us.
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if let Some(msg) = state.items.pop_front() {
                    return Some(msg);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Closes the queue and wakes every waiting popper. Idempotent.
    pub fn close(&self) {
        self.state().closed = true;
        self.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Number of messages waiting to be popped.
    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Publisher
// ============================================================================

/// The pair of queues every published message goes through.
///
/// Each message is copied onto the dispatch queue (fan-out to clients) and
/// the log queue (chat transcript). Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Publisher {
    dispatch: Arc<MessageQueue>,
    log: Arc<MessageQueue>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a copy of `msg` onto both queues.
    pub fn publish(&self, msg: ChatMessage) {
        self.dispatch.push(msg.clone());
        self.log.push(msg);
    }

    /// Closes both queues.
    pub fn close(&self) {
        self.dispatch.close();
        self.log.close();
    }

    pub fn dispatch_queue(&self) -> &Arc<MessageQueue> {
        &self.dispatch
    }

    pub fn log_queue(&self) -> &Arc<MessageQueue> {
        &self.log
    }
}
