//! Terminal formatting of received records.

use chrono::Local;

use parlor_protocol::ChatMessage;

/// Formats `msg` as seen by the user named `me`, without a trailing newline.
///
/// ```text
/// [12:00:01] *** bob joined
/// [12:00:02] <alice> hi
/// [12:00:03] (private) <alice> secret
/// [12:00:04] (to alice) <bob> also secret
/// ```
pub fn render(me: &str, msg: &ChatMessage) -> String {
    let time = msg.timestamp().with_timezone(&Local).format("%H:%M:%S");

    if msg.is_system() {
        format!("[{time}] *** {}", msg.text())
    } else if msg.is_broadcast() {
        format!("[{time}] <{}> {}", msg.sender(), msg.text())
    } else if msg.sender() == me {
        format!("[{time}] (to {}) <{}> {}", msg.target(), msg.sender(), msg.text())
    } else {
        format!("[{time}] (private) <{}> {}", msg.sender(), msg.text())
    }
}
