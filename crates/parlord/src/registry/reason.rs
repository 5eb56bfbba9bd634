//! Why a session left the registry.

use std::fmt;

/// Reason a session was removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// The connection failed or the client hung up.
    Disconnected,

    /// No inbound message within the inactivity timeout.
    Inactivity,

    /// The server is stopping. No notice is published.
    Shutdown,
}

impl RemovalReason {
    /// System notice announcing that `identity` left, if this reason has one.
    pub fn notice(&self, identity: &str) -> Option<String> {
        match self {
            Self::Inactivity => Some(format!("{identity} was disconnected due to inactivity")),
            Self::Disconnected => Some(format!("{identity} left ({self})")),
            Self::Shutdown => None,
        }
    }
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Inactivity => write!(f, "inactivity"),
            Self::Shutdown => write!(f, "server shutdown"),
        }
    }
}
