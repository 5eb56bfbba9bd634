//! Transport selection shared by server and client.

use std::fmt;
use std::path::PathBuf;

/// Default Unix socket path.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/pos_chat.sock";

/// Default TCP port.
pub const DEFAULT_TCP_PORT: u16 = 5555;

/// Stream transport a server listens on or a client dials.
///
/// Exactly one transport is active per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Filesystem-addressed Unix-domain stream socket.
    Unix(PathBuf),

    /// TCP stream socket.
    Tcp {
        /// Host to bind (server) or connect to (client)
        host: String,
        /// TCP port
        port: u16,
    },
}

impl Transport {
    /// Unix socket transport at `path`.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix(path.into())
    }

    /// TCP transport at `host:port`.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::Unix(PathBuf::from(DEFAULT_SOCKET_PATH))
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp { host, port } => write!(f, "tcp:{host}:{port}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_transport() {
        assert_eq!(Transport::default(), Transport::unix(DEFAULT_SOCKET_PATH));
    }

    #[test]
    fn test_display() {
        assert_eq!(Transport::unix("/tmp/x.sock").to_string(), "unix:/tmp/x.sock");
        assert_eq!(Transport::tcp("127.0.0.1", 5555).to_string(), "tcp:127.0.0.1:5555");
    }
}
