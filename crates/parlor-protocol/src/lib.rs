//! Parlor Protocol - Wire records shared by the chat server and client
//!
//! Every message on the wire is one fixed-size record, so framing needs no
//! length prefix: a reader pulls exactly [`RECORD_SIZE`] bytes per message.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod codec;
pub mod message;
pub mod transport;

pub use codec::{decode, encode, read_message, write_message, WireError, RECORD_SIZE};
pub use message::{ChatMessage, SYSTEM_SENDER, TEXT_MAX, USERNAME_MAX};
pub use transport::{Transport, DEFAULT_SOCKET_PATH, DEFAULT_TCP_PORT};
