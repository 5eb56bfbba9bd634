//! Eviction of idle sessions.
//!
//! # Panic-Free Guarantees
//!
//! All code follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Uses pattern matching for every fallible operation

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::{Registry, RemovalReason};

/// Removes every session idle for at least `timeout`.
///
/// Candidates are collected under the registry lock; the removals (which
/// shut sockets down and publish notices) run after it is released.
/// Returns the number of sessions this sweep evicted.
pub async fn sweep(registry: &Registry, timeout: Duration) -> usize {
    let stale = registry.idle_sessions(Instant::now(), timeout).await;
    if stale.is_empty() {
        debug!("No idle sessions to evict");
        return 0;
    }

    let mut evicted = 0;
    for session in stale {
        if registry.remove(&session, RemovalReason::Inactivity).await {
            warn!(
                client = %session.id(),
                identity = %session.identity(),
                timeout_secs = timeout.as_secs(),
                "Session evicted for inactivity"
            );
            evicted += 1;
        }
    }
    evicted
}

/// Shortest sweep period; `interval_at` rejects a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Spawns the watchdog task.
///
/// Sweeps every `period` (at least [`MIN_PERIOD`]) until `cancel_token` is
/// cancelled.
pub fn spawn_watchdog(
    registry: Arc<Registry>,
    timeout: Duration,
    period: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    let period = period.max(MIN_PERIOD);
    tokio::spawn(async move {
        let mut tick = interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            timeout_secs = timeout.as_secs(),
            interval_ms = period.as_millis() as u64,
            "Watchdog started"
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    info!("Watchdog shutting down");
                    break;
                }

                _ = tick.tick() => {
                    sweep(&registry, timeout).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::Publisher;
    use crate::registry::{Session, SessionId};
    use tokio::io::DuplexStream;

    const TIMEOUT: Duration = Duration::from_secs(300);
    const PERIOD: Duration = Duration::from_secs(5);

    async fn add_session(registry: &Registry, id: u64, name: &str) -> (Arc<Session>, DuplexStream) {
        let (server_side, client_side) = tokio::io::duplex(4096);
        let session = Arc::new(Session::new(
            SessionId::new(id),
            name,
            Box::new(server_side),
            CancellationToken::new(),
        ));
        registry.add(Arc::clone(&session)).await;
        (session, client_side)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_only_idle_sessions() {
        let registry = Registry::new(Publisher::new());
        let (idle, _a) = add_session(&registry, 1, "idle").await;
        let (active, _b) = add_session(&registry, 2, "active").await;

        tokio::time::advance(TIMEOUT - Duration::from_secs(1)).await;
        active.touch();
        assert_eq!(sweep(&registry, TIMEOUT).await, 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(sweep(&registry, TIMEOUT).await, 1);

        assert!(idle.is_removed());
        assert!(idle.is_closed());
        assert!(!active.is_removed());
        assert_eq!(registry.identities().await, vec!["active"]);

        let notice = registry.publisher().dispatch_queue().pop().await.unwrap();
        assert!(notice.is_system());
        assert_eq!(notice.text(), "idle was disconnected due to inactivity");
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_task_evicts_on_tick() {
        let registry = Arc::new(Registry::new(Publisher::new()));
        let (idle, _peer) = add_session(&registry, 1, "idle").await;
        let cancel_token = CancellationToken::new();

        let handle = spawn_watchdog(Arc::clone(&registry), TIMEOUT, PERIOD, cancel_token.clone());

        // Crossing the timeout, then one more period for the next sweep.
        tokio::time::sleep(TIMEOUT + PERIOD).await;
        assert!(idle.is_removed());
        assert!(registry.is_empty().await);

        cancel_token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_still_sweeps() {
        let registry = Arc::new(Registry::new(Publisher::new()));
        let (idle, _peer) = add_session(&registry, 1, "idle").await;
        let cancel_token = CancellationToken::new();

        let timeout = Duration::from_millis(20);
        let handle = spawn_watchdog(
            Arc::clone(&registry),
            timeout,
            Duration::ZERO,
            cancel_token.clone(),
        );

        tokio::time::sleep(timeout + Duration::from_millis(5)).await;
        assert!(idle.is_removed());

        cancel_token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_stops_on_cancel() {
        let registry = Arc::new(Registry::new(Publisher::new()));
        let cancel_token = CancellationToken::new();
        let handle = spawn_watchdog(registry, TIMEOUT, PERIOD, cancel_token.clone());

        cancel_token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
