//! Bound, listening endpoint for either transport.

use std::io;
use std::path::PathBuf;

use tokio::net::{TcpListener, UnixListener};
use tracing::{debug, warn};

use parlor_protocol::Transport;

use super::ServerError;
use crate::registry::{ConnReader, ConnWriter};

/// A listening socket, Unix-domain or TCP.
///
/// A Unix listener removes its socket file on [`Listener::close`].
#[derive(Debug)]
pub enum Listener {
    Unix {
        listener: UnixListener,
        path: PathBuf,
    },
    Tcp(TcpListener),
}

impl Listener {
    /// Binds and listens on `transport`.
    ///
    /// For Unix sockets a stale socket file is replaced and missing parent
    /// directories are created.
    pub async fn bind(transport: &Transport) -> Result<Self, ServerError> {
        let setup_error = |error: io::Error| ServerError::TransportSetup {
            endpoint: transport.to_string(),
            error: error.to_string(),
        };

        match transport {
            Transport::Unix(path) => {
                if path.exists() {
                    std::fs::remove_file(path).map_err(setup_error)?;
                }
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent).map_err(setup_error)?;
                    }
                }
                let listener = UnixListener::bind(path).map_err(setup_error)?;
                Ok(Self::Unix {
                    listener,
                    path: path.clone(),
                })
            }
            Transport::Tcp { host, port } => {
                let listener = TcpListener::bind((host.as_str(), *port))
                    .await
                    .map_err(setup_error)?;
                Ok(Self::Tcp(listener))
            }
        }
    }

    /// Waits for the next connection and splits it into read and write halves.
    ///
    /// Returns the halves plus a printable peer description.
    pub async fn accept(&self) -> io::Result<(ConnReader, ConnWriter, String)> {
        match self {
            Self::Unix { listener, .. } => {
                let (stream, _addr) = listener.accept().await?;
                let (reader, writer) = stream.into_split();
                Ok((Box::new(reader), Box::new(writer), "unix".to_string()))
            }
            Self::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(peer = %addr, error = %e, "Failed to set TCP_NODELAY");
                }
                let (reader, writer) = stream.into_split();
                Ok((Box::new(reader), Box::new(writer), addr.to_string()))
            }
        }
    }

    /// The transport actually bound. For TCP this carries the real port,
    /// which differs from the requested one when port 0 was asked for.
    pub fn local_transport(&self) -> io::Result<Transport> {
        match self {
            Self::Unix { path, .. } => Ok(Transport::Unix(path.clone())),
            Self::Tcp(listener) => {
                let addr = listener.local_addr()?;
                Ok(Transport::tcp(addr.ip().to_string(), addr.port()))
            }
        }
    }

    /// Stops listening and removes the Unix socket file, if any.
    pub fn close(self) {
        if let Self::Unix { listener, path } = self {
            drop(listener);
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(
                        socket = %path.display(),
                        error = %e,
                        "Failed to remove socket file"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unix_bind_replaces_stale_file_and_close_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chat.sock");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"stale").unwrap();

        let listener = Listener::bind(&Transport::unix(&path)).await.unwrap();
        assert_eq!(listener.local_transport().unwrap(), Transport::unix(&path));

        listener.close();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_tcp_bind_ephemeral_port() {
        let listener = Listener::bind(&Transport::tcp("127.0.0.1", 0)).await.unwrap();
        match listener.local_transport().unwrap() {
            Transport::Tcp { port, .. } => assert_ne!(port, 0),
            other => panic!("unexpected transport {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bind_failure_is_transport_setup_error() {
        let first = Listener::bind(&Transport::tcp("127.0.0.1", 0)).await.unwrap();
        let taken = first.local_transport().unwrap();

        let err = Listener::bind(&taken).await.unwrap_err();
        assert!(matches!(err, ServerError::TransportSetup { .. }));
        assert!(err.to_string().contains("tcp:127.0.0.1"));
    }
}
