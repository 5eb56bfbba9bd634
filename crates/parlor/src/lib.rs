//! Parlor Client - interactive line client for the chat relay
//!
//! This crate provides the pieces behind the `parlor` binary:
//! - `compose` - Turns typed lines into outgoing messages (`@name text` whispers)
//! - `render` - Formats received records for the terminal
//! - `client` - Connection, handshake and the send/receive loops
//! - `error` - Client error types
//!
//! **Panic-Free Policy:** All production code follows the project's
//! panic-free guidelines. No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()`.

pub mod client;
pub mod compose;
pub mod error;
pub mod render;

pub use client::{ChatClient, ClientConfig, ClientExit};
pub use compose::{parse_line, Outgoing};
pub use error::{ClientError, Result};
pub use render::render;
