//! Error types for the chat client.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;

use parlor_protocol::WireError;
use thiserror::Error;

/// Chat client errors.
///
/// # Example
///
/// ```rust
/// use parlor_client::error::{ClientError, Result};
///
/// fn check_name(name: &str) -> Result<()> {
///     if name.trim().is_empty() {
///         return Err(ClientError::EmptyName);
///     }
///     Ok(())
/// }
///
/// assert!(check_name("  ").is_err());
/// ```
#[derive(Error, Debug)]
pub enum ClientError {
    /// The display name is blank; the server would reject the handshake.
    #[error("Display name must not be empty")]
    EmptyName,

    /// Failed to connect to the server.
    ///
    /// Usually the server is not running or listens on another endpoint.
    #[error("Failed to connect to {endpoint}: {error}")]
    Connect { endpoint: String, error: io::Error },

    /// Sending a record to the server failed.
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_names_endpoint() {
        let err = ClientError::Connect {
            endpoint: "unix:/tmp/none.sock".to_string(),
            error: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("Failed to connect to unix:/tmp/none.sock"));
    }

    #[test]
    fn test_wire_error_conversion() {
        let err: ClientError = WireError::Closed.into();
        assert!(matches!(err, ClientError::Wire(WireError::Closed)));
    }
}
