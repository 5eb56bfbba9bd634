//! Fan-out of published messages to registered sessions.
//!
//! A single dispatcher task drains the dispatch queue, so every client sees
//! delivered messages in the same relative order.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use parlor_protocol::ChatMessage;

use crate::queue::MessageQueue;
use crate::registry::Registry;

/// Consumer of the dispatch queue.
pub struct Dispatcher {
    queue: Arc<MessageQueue>,
    registry: Arc<Registry>,
    write_timeout: Duration,
}

impl Dispatcher {
    pub fn new(queue: Arc<MessageQueue>, registry: Arc<Registry>, write_timeout: Duration) -> Self {
        Self {
            queue,
            registry,
            write_timeout,
        }
    }

    /// Delivers messages until the queue is closed and drained.
    pub async fn run(self) {
        info!("Dispatcher started");

        let mut dispatched: u64 = 0;
        while let Some(msg) = self.queue.pop().await {
            self.dispatch(&msg).await;
            dispatched += 1;
        }

        info!(dispatched, "Dispatcher stopped");
    }

    /// Writes `msg` to every session it is addressed to.
    ///
    /// A failed write closes that session's connection; its receive loop then
    /// performs the removal. Returns the number of successful deliveries.
    pub async fn dispatch(&self, msg: &ChatMessage) -> usize {
        let members = self.registry.members().await;
        let mut delivered = 0;

        for session in members.iter() {
            if session.is_closed() || !msg.is_addressed_to(session.identity()) {
                continue;
            }

            match session.deliver(msg, self.write_timeout).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(
                        client = %session.id(),
                        identity = %session.identity(),
                        error = %e,
                        "Delivery failed, closing connection"
                    );
                    session.close_connection();
                }
            }
        }

        debug!(
            sender = %msg.sender(),
            target = %msg.target(),
            delivered,
            "Message dispatched"
        );
        delivered
    }
}

/// Spawns the dispatcher task.
pub fn spawn_dispatcher(
    queue: Arc<MessageQueue>,
    registry: Arc<Registry>,
    write_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(Dispatcher::new(queue, registry, write_timeout).run())
}
