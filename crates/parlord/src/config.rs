//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use parlor_protocol::Transport;

/// Idle time after which the watchdog evicts a session (5 minutes).
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

/// How often the watchdog sweeps the registry.
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on a single delivery write (10 seconds).
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a [`ChatServer`](crate::server::ChatServer).
///
/// # Example
///
/// ```rust
/// use parlord::config::ServerConfig;
/// use parlor_protocol::Transport;
/// use std::time::Duration;
///
/// let config = ServerConfig {
///     transport: Transport::tcp("0.0.0.0", 6000),
///     inactivity_timeout: Duration::from_secs(60),
///     ..Default::default()
/// };
/// assert_eq!(config.handshake_timeout(), Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Endpoint to listen on.
    pub transport: Transport,

    /// Sessions idle this long are evicted.
    pub inactivity_timeout: Duration,

    /// Period between watchdog sweeps.
    pub watchdog_interval: Duration,

    /// Maximum time a single delivery may block the dispatcher.
    pub write_timeout: Duration,

    /// Maximum wait for the handshake record. `None` uses the inactivity timeout.
    pub handshake_timeout: Option<Duration>,

    /// Append-only chat transcript.
    pub chat_log_path: PathBuf,
}

impl ServerConfig {
    /// Effective handshake timeout.
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout.unwrap_or(self.inactivity_timeout)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            handshake_timeout: None,
            chat_log_path: default_chat_log_path(),
        }
    }
}

/// Returns the default chat transcript path (`$XDG_STATE_HOME/parlor/chat.log`).
pub fn default_chat_log_path() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("parlor")
        .join("chat.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.inactivity_timeout, Duration::from_secs(300));
        assert_eq!(config.watchdog_interval, Duration::from_secs(5));
        assert_eq!(config.handshake_timeout(), config.inactivity_timeout);
        assert!(config.chat_log_path.ends_with("parlor/chat.log"));
    }

    #[test]
    fn test_explicit_handshake_timeout() {
        let config = ServerConfig {
            handshake_timeout: Some(Duration::from_secs(3)),
            ..Default::default()
        };
        assert_eq!(config.handshake_timeout(), Duration::from_secs(3));
    }
}
