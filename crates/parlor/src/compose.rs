//! Turning typed lines into outgoing messages.

use parlor_protocol::ChatMessage;

/// A message the user composed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Sent to everyone.
    Broadcast(String),

    /// Sent to the sessions named `target` only.
    Direct { target: String, text: String },
}

impl Outgoing {
    /// Builds the wire record. The server overwrites the sender anyway.
    pub fn into_message(self, me: &str) -> ChatMessage {
        match self {
            Self::Broadcast(text) => ChatMessage::broadcast(me, text),
            Self::Direct { target, text } => ChatMessage::direct(me, target, text),
        }
    }
}

/// Parses one line of user input.
///
/// - blank lines yield `None`
/// - `@name text` yields a direct message to `name` with the prefix stripped
/// - `@name` with no text yields `None`
/// - a lone `@` (no name) is sent as an ordinary broadcast
/// - anything else is a broadcast of the trimmed line
pub fn parse_line(line: &str) -> Option<Outgoing> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(rest) = line.strip_prefix('@') else {
        return Some(Outgoing::Broadcast(line.to_string()));
    };

    let (target, text) = match rest.split_once(char::is_whitespace) {
        Some((target, text)) => (target, text.trim()),
        None => (rest, ""),
    };

    if target.is_empty() {
        return Some(Outgoing::Broadcast(line.to_string()));
    }
    if text.is_empty() {
        return None;
    }

    Some(Outgoing::Direct {
        target: target.to_string(),
        text: text.to_string(),
    })
}
