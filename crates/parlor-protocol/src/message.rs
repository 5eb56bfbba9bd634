//! Chat message value type.

use chrono::{DateTime, SubsecRound, Utc};
use std::fmt;

// ============================================================================
// Field Bounds
// ============================================================================

/// Capacity of the `sender` and `target` fields on the wire, terminator included.
pub const USERNAME_MAX: usize = 32;

/// Capacity of the `text` field on the wire, terminator included.
pub const TEXT_MAX: usize = 256;

/// Sender name used for notices synthesized by the server.
pub const SYSTEM_SENDER: &str = "server";

/// Cuts `value` at the first NUL and truncates it to fit a field of
/// `capacity` bytes, leaving room for the NUL terminator.
///
/// Truncation never splits a UTF-8 character.
pub(crate) fn bounded(value: &str, capacity: usize) -> String {
    let value = value.split('\0').next().unwrap_or_default();
    let max = capacity.saturating_sub(1);
    if value.len() <= max {
        return value.to_string();
    }

    let mut end = max;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    value.get(..end).unwrap_or_default().to_string()
}

// ============================================================================
// Chat Message
// ============================================================================

/// One chat record as exchanged between clients and the server.
///
/// A message is immutable once built: every "setter" consumes the value and
/// returns a new one, so copies handed to different components can never
/// diverge. All string fields are bounded to their wire capacity on
/// construction, so encoding never loses data silently.
///
/// An empty `target` means broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    sender: String,
    target: String,
    text: String,
    timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates a message stamped with the current time.
    pub fn new(
        sender: impl AsRef<str>,
        target: impl AsRef<str>,
        text: impl AsRef<str>,
    ) -> Self {
        Self {
            sender: bounded(sender.as_ref(), USERNAME_MAX),
            target: bounded(target.as_ref(), USERNAME_MAX),
            text: bounded(text.as_ref(), TEXT_MAX),
            timestamp: now(),
        }
    }

    /// Creates a message for every connected client.
    pub fn broadcast(sender: impl AsRef<str>, text: impl AsRef<str>) -> Self {
        Self::new(sender, "", text)
    }

    /// Creates a message addressed to a single identity.
    pub fn direct(
        sender: impl AsRef<str>,
        target: impl AsRef<str>,
        text: impl AsRef<str>,
    ) -> Self {
        Self::new(sender, target, text)
    }

    /// Creates a broadcast notice from the server itself.
    pub fn system(text: impl AsRef<str>) -> Self {
        Self::broadcast(SYSTEM_SENDER, text)
    }

    /// Creates the handshake record declaring `identity` as display name.
    pub fn handshake(identity: impl AsRef<str>) -> Self {
        Self::broadcast(identity, "")
    }

    /// Returns a copy with the sender replaced and the timestamp reset to now.
    ///
    /// The server uses this to attribute inbound records to the session that
    /// sent them, regardless of what the client claimed.
    #[must_use]
    pub fn attributed_to(self, sender: impl AsRef<str>) -> Self {
        Self {
            sender: bounded(sender.as_ref(), USERNAME_MAX),
            timestamp: now(),
            ..self
        }
    }

    /// Returns a copy with the given text.
    #[must_use]
    pub fn with_text(self, text: impl AsRef<str>) -> Self {
        Self {
            text: bounded(text.as_ref(), TEXT_MAX),
            ..self
        }
    }

    /// Returns a copy with the given timestamp (sub-second part dropped).
    #[must_use]
    pub fn with_timestamp(self, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
            ..self
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns true if the message has no target.
    pub fn is_broadcast(&self) -> bool {
        self.target.is_empty()
    }

    /// Returns true if the server sent this message.
    pub fn is_system(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }

    /// Returns true if a session named `identity` should receive this message.
    ///
    /// Broadcasts reach everyone, the sender included. Targeted messages
    /// reach sessions whose identity equals the target exactly
    /// (case-sensitive).
    pub fn is_addressed_to(&self, identity: &str) -> bool {
        self.is_broadcast() || self.target == identity
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_broadcast() {
            write!(f, "<{}> {}", self.sender, self.text)
        } else {
            write!(f, "<{} -> {}> {}", self.sender, self.target, self.text)
        }
    }
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}
