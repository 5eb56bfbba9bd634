//! Fixed-size record framing.
//!
//! The record layout matches the legacy C `ChatMessage` struct on x86-64,
//! so old and new peers interoperate:
//!
//! ```text
//! offset  size  field
//!      0    32  sender     NUL-padded
//!     32    32  target     NUL-padded, empty = broadcast
//!     64   256  text       NUL-padded
//!    320     8  timestamp  i64 little-endian, seconds since the Unix epoch
//! ```

use std::io;

use chrono::DateTime;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::message::{ChatMessage, TEXT_MAX, USERNAME_MAX};

const SENDER_OFFSET: usize = 0;
const TARGET_OFFSET: usize = SENDER_OFFSET + USERNAME_MAX;
const TEXT_OFFSET: usize = TARGET_OFFSET + USERNAME_MAX;
const TIMESTAMP_OFFSET: usize = TEXT_OFFSET + TEXT_MAX;
const TIMESTAMP_LEN: usize = 8;

/// Size in bytes of every record on the wire.
pub const RECORD_SIZE: usize = TIMESTAMP_OFFSET + TIMESTAMP_LEN;

/// Errors raised while moving records over a connection.
#[derive(Debug, Error)]
pub enum WireError {
    /// The peer closed the connection (EOF or a zero-length write).
    #[error("connection closed by peer")]
    Closed,

    /// Any other, non-retryable I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// Encoding
// ============================================================================

/// Encodes a message into its fixed-size record.
pub fn encode(msg: &ChatMessage) -> [u8; RECORD_SIZE] {
    let mut record = [0u8; RECORD_SIZE];
    put_field(&mut record, SENDER_OFFSET, USERNAME_MAX, msg.sender());
    put_field(&mut record, TARGET_OFFSET, USERNAME_MAX, msg.target());
    put_field(&mut record, TEXT_OFFSET, TEXT_MAX, msg.text());
    put_field_bytes(
        &mut record,
        TIMESTAMP_OFFSET,
        TIMESTAMP_LEN,
        &msg.timestamp().timestamp().to_le_bytes(),
    );
    record
}

/// Decodes a record. Never fails: fields are read up to their first NUL and
/// invalid UTF-8 is replaced.
pub fn decode(record: &[u8; RECORD_SIZE]) -> ChatMessage {
    let sender = get_field(record, SENDER_OFFSET, USERNAME_MAX);
    let target = get_field(record, TARGET_OFFSET, USERNAME_MAX);
    let text = get_field(record, TEXT_OFFSET, TEXT_MAX);

    let mut seconds = [0u8; TIMESTAMP_LEN];
    if let Some(raw) = record.get(TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + TIMESTAMP_LEN) {
        seconds.copy_from_slice(raw);
    }
    let timestamp = DateTime::from_timestamp(i64::from_le_bytes(seconds), 0).unwrap_or_default();

    ChatMessage::new(sender, target, text).with_timestamp(timestamp)
}

fn put_field(record: &mut [u8; RECORD_SIZE], offset: usize, capacity: usize, value: &str) {
    // Leave at least one NUL terminator, as C readers expect.
    let len = value.len().min(capacity.saturating_sub(1));
    put_field_bytes(record, offset, capacity, value.as_bytes().get(..len).unwrap_or_default());
}

fn put_field_bytes(record: &mut [u8; RECORD_SIZE], offset: usize, capacity: usize, bytes: &[u8]) {
    let len = bytes.len().min(capacity);
    if let (Some(dst), Some(src)) = (record.get_mut(offset..offset + len), bytes.get(..len)) {
        dst.copy_from_slice(src);
    }
}

fn get_field(record: &[u8; RECORD_SIZE], offset: usize, capacity: usize) -> String {
    let field = record.get(offset..offset + capacity).unwrap_or_default();
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(field.get(..end).unwrap_or_default()).into_owned()
}

// ============================================================================
// Connection I/O
// ============================================================================

/// Reads exactly one record from `reader`.
///
/// Short reads and `Interrupted` errors are retried. EOF, including EOF in
/// the middle of a record, yields [`WireError::Closed`].
pub async fn read_message<R>(reader: &mut R) -> Result<ChatMessage, WireError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut record = [0u8; RECORD_SIZE];
    let mut filled = 0;

    while filled < RECORD_SIZE {
        let Some(rest) = record.get_mut(filled..) else {
            break;
        };
        match reader.read(rest).await {
            Ok(0) => return Err(WireError::Closed),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(WireError::Io(e)),
        }
    }

    Ok(decode(&record))
}

/// Writes one record to `writer` and flushes it.
///
/// Short writes and `Interrupted` errors are retried. A zero-length write
/// means the peer is gone and yields [`WireError::Closed`].
pub async fn write_message<W>(writer: &mut W, msg: &ChatMessage) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let record = encode(msg);
    let mut sent = 0;

    while sent < RECORD_SIZE {
        let Some(rest) = record.get(sent..) else {
            break;
        };
        match writer.write(rest).await {
            Ok(0) => return Err(WireError::Closed),
            Ok(n) => sent += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(WireError::Io(e)),
        }
    }

    writer.flush().await?;
    Ok(())
}
