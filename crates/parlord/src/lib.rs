//! Parlor Daemon - client registry and message relay server
//!
//! This crate provides the concurrent message broker behind the chat server:
//! - `queue` - Closable FIFO hand-off between producers and consumers
//! - `registry` - Live sessions and their idempotent teardown
//! - `server` - Listener, per-connection handlers and lifecycle coordination
//! - `dispatcher` - Fan-out of published messages to matching sessions
//! - `chatlog` - Append-only chat transcript
//! - `watchdog` - Eviction of idle sessions
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐ publish ┌────────────────┐ pop  ┌──────────────┐
//! │ConnectionHandler │───────▶│ dispatch queue │────▶│  Dispatcher  │──▶ sessions
//! │   (per client)   │───┐    └────────────────┘      └──────┬───────┘
//! └────────┬─────────┘   │    ┌────────────────┐ pop  ┌──────▼───────┐
//!          │ add/remove  └──▶│   log queue    │────▶│  ChatLogger  │──▶ chat.log
//!          ▼                  └────────────────┘      └──────────────┘
//! ┌──────────────────┐  sweep ┌────────────────┐
//! │     Registry     │◀──────│    Watchdog    │
//! └──────────────────┘        └────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Poisoned locks are recovered rather than propagated as panics

pub mod chatlog;
pub mod config;
pub mod dispatcher;
pub mod queue;
pub mod registry;
pub mod server;
pub mod watchdog;
