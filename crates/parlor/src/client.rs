//! Server connection for the interactive client.
//!
//! This module provides the `ChatClient` which handles:
//! - Connection over a Unix socket or TCP
//! - The handshake that declares the display name
//! - A receive task printing rendered records
//! - Sending composed lines until input ends, the server leaves or the user interrupts
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parlor_protocol::{read_message, write_message, ChatMessage, Transport};

use crate::compose::parse_line;
use crate::error::{ClientError, Result};
use crate::render::render;

type ServerReader = Box<dyn AsyncRead + Send + Unpin>;
type ServerWriter = Box<dyn AsyncWrite + Send + Unpin>;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the chat client.
///
/// # Example
///
/// ```rust
/// use parlor_client::ClientConfig;
/// use parlor_protocol::Transport;
///
/// let config = ClientConfig {
///     transport: Transport::tcp("127.0.0.1", 5555),
///     ..ClientConfig::new("alice")
/// };
/// assert_eq!(config.name, "alice");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Display name sent in the handshake.
    pub name: String,

    /// Server endpoint.
    pub transport: Transport,
}

impl ClientConfig {
    /// Creates a configuration for `name` on the default Unix socket.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: Transport::default(),
        }
    }

    /// The identity the server will assign: trimmed and bounded to the
    /// wire capacity.
    pub fn identity(&self) -> String {
        ChatMessage::handshake(self.name.trim())
            .sender()
            .trim()
            .to_string()
    }
}

/// Why a chat session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientExit {
    /// The input stream reached end of file.
    InputClosed,

    /// The server closed the connection.
    ServerClosed,

    /// The cancellation token fired (Ctrl-C).
    Interrupted,
}

// ============================================================================
// Chat Client
// ============================================================================

/// Interactive chat client.
///
/// # Session Lifecycle
///
/// 1. Connects to the configured transport
/// 2. Sends the handshake record carrying the display name
/// 3. Spawns a receive task that renders every record to the output
/// 4. Sends each composed input line; whispers are echoed locally since the
///    server only delivers them to their target
/// 5. Stops on end of input, server disconnect or cancellation
pub struct ChatClient {
    config: ClientConfig,
    cancel_token: CancellationToken,
}

impl ChatClient {
    pub fn new(config: ClientConfig, cancel_token: CancellationToken) -> Self {
        Self {
            config,
            cancel_token,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Runs one chat session, reading lines from `input` and writing
    /// rendered records to `output`.
    pub async fn run<I, O>(&self, input: I, output: O) -> Result<ClientExit>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Send + Unpin + 'static,
    {
        let me = self.config.identity();
        if me.is_empty() {
            return Err(ClientError::EmptyName);
        }

        let (reader, mut writer) = connect(&self.config.transport).await?;
        write_message(&mut writer, &ChatMessage::handshake(&me)).await?;
        info!(endpoint = %self.config.transport, identity = %me, "Connected");

        let output = Arc::new(Mutex::new(output));
        let session = self.cancel_token.child_token();
        let receiver = tokio::spawn(receive_loop(
            reader,
            me.clone(),
            Arc::clone(&output),
            session.clone(),
        ));

        let mut lines = input.lines();
        let exit = loop {
            tokio::select! {
                biased;

                _ = session.cancelled() => {
                    break if self.cancel_token.is_cancelled() {
                        ClientExit::Interrupted
                    } else {
                        ClientExit::ServerClosed
                    };
                }

                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break ClientExit::InputClosed;
                    };
                    let Some(outgoing) = parse_line(&line) else {
                        continue;
                    };

                    let msg = outgoing.into_message(&me);
                    if let Err(e) = write_message(&mut writer, &msg).await {
                        debug!(error = %e, "Send failed");
                        break ClientExit::ServerClosed;
                    }
                    if !msg.is_broadcast() && msg.target() != me {
                        print_line(&output, &render(&me, &msg)).await?;
                    }
                }
            }
        };

        session.cancel();
        if let Err(e) = writer.shutdown().await {
            debug!(error = %e, "Failed to shut down connection");
        }
        if let Err(e) = receiver.await {
            warn!(error = %e, "Receive task failed");
        }

        info!(?exit, "Chat session ended");
        Ok(exit)
    }
}

/// Opens a connection to `transport`.
async fn connect(transport: &Transport) -> Result<(ServerReader, ServerWriter)> {
    let connect_error = |error| ClientError::Connect {
        endpoint: transport.to_string(),
        error,
    };

    match transport {
        Transport::Unix(path) => {
            let stream = UnixStream::connect(path).await.map_err(connect_error)?;
            let (reader, writer) = stream.into_split();
            Ok((Box::new(reader), Box::new(writer)))
        }
        Transport::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), *port))
                .await
                .map_err(connect_error)?;
            let (reader, writer) = stream.into_split();
            Ok((Box::new(reader), Box::new(writer)))
        }
    }
}

/// Renders records from the server until it disconnects or `session` is
/// cancelled. Cancels `session` on the way out.
async fn receive_loop<O>(
    mut reader: ServerReader,
    me: String,
    output: Arc<Mutex<O>>,
    session: CancellationToken,
) where
    O: AsyncWrite + Unpin,
{
    loop {
        let msg = tokio::select! {
            biased;

            _ = session.cancelled() => break,

            result = read_message(&mut reader) => match result {
                Ok(msg) => msg,
                Err(e) => {
                    debug!(error = %e, "Server connection ended");
                    break;
                }
            },
        };

        if let Err(e) = print_line(&output, &render(&me, &msg)).await {
            warn!(error = %e, "Failed to write output");
            break;
        }
    }

    session.cancel();
}

async fn print_line<O>(output: &Mutex<O>, line: &str) -> std::io::Result<()>
where
    O: AsyncWrite + Unpin,
{
    let mut output = output.lock().await;
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt as _, BufReader, DuplexStream};
    use tokio::net::UnixListener;
    use tokio::time::timeout;

    /// A one-connection fake server on a temporary Unix socket.
    struct FakeServer {
        listener: UnixListener,
        transport: Transport,
        _temp_dir: tempfile::TempDir,
    }

    impl FakeServer {
        fn bind() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let path = temp_dir.path().join("fake.sock");
            let listener = UnixListener::bind(&path).unwrap();
            Self {
                listener,
                transport: Transport::unix(path),
                _temp_dir: temp_dir,
            }
        }

        async fn accept(&self) -> UnixStream {
            let (stream, _) = timeout(Duration::from_secs(1), self.listener.accept())
                .await
                .unwrap()
                .unwrap();
            stream
        }
    }

    fn spawn_client(
        transport: Transport,
        name: &str,
        cancel_token: CancellationToken,
    ) -> (
        DuplexStream,
        BufReader<DuplexStream>,
        tokio::task::JoinHandle<Result<ClientExit>>,
    ) {
        let (input_tx, input_rx) = tokio::io::duplex(1024);
        let (output_tx, output_rx) = tokio::io::duplex(4096);
        let config = ClientConfig {
            transport,
            ..ClientConfig::new(name)
        };
        let client = ChatClient::new(config, cancel_token);
        let handle =
            tokio::spawn(async move { client.run(BufReader::new(input_rx), output_tx).await });
        (input_tx, BufReader::new(output_rx), handle)
    }

    async fn next_output(output: &mut BufReader<DuplexStream>) -> String {
        let mut line = String::new();
        timeout(Duration::from_secs(1), output.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        line.trim_end().to_string()
    }

    #[test]
    fn test_identity_is_trimmed_and_bounded() {
        assert_eq!(ClientConfig::new("  alice ").identity(), "alice");
        let long = "n".repeat(100);
        assert_eq!(ClientConfig::new(long).identity().len(), 31);
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected_before_connecting() {
        let client = ChatClient::new(ClientConfig::new("   "), CancellationToken::new());
        let result = client.run(BufReader::new(&b""[..]), tokio::io::sink()).await;
        assert!(matches!(result, Err(ClientError::EmptyName)));
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            transport: Transport::unix(temp_dir.path().join("missing.sock")),
            ..ClientConfig::new("alice")
        };
        let client = ChatClient::new(config, CancellationToken::new());
        let result = client.run(BufReader::new(&b""[..]), tokio::io::sink()).await;
        assert!(matches!(result, Err(ClientError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_handshake_then_send_and_receive() {
        let server = FakeServer::bind();
        let (mut input, mut output, handle) =
            spawn_client(server.transport.clone(), "alice", CancellationToken::new());
        let mut conn = server.accept().await;

        let handshake = read_message(&mut conn).await.unwrap();
        assert_eq!(handshake.sender(), "alice");
        assert!(handshake.text().is_empty());

        input.write_all(b"hello\n\n@bob psst\n").await.unwrap();

        let sent = read_message(&mut conn).await.unwrap();
        assert!(sent.is_broadcast());
        assert_eq!(sent.text(), "hello");

        let whisper = read_message(&mut conn).await.unwrap();
        assert_eq!(whisper.target(), "bob");
        assert_eq!(whisper.text(), "psst");
        assert!(next_output(&mut output).await.ends_with("(to bob) <alice> psst"));

        write_message(&mut conn, &ChatMessage::system("bob joined")).await.unwrap();
        assert!(next_output(&mut output).await.ends_with("*** bob joined"));

        drop(input);
        let exit = timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert_eq!(exit.unwrap(), ClientExit::InputClosed);
    }

    #[tokio::test]
    async fn test_server_disconnect_ends_session() {
        let server = FakeServer::bind();
        let (_input, _output, handle) =
            spawn_client(server.transport.clone(), "alice", CancellationToken::new());
        let mut conn = server.accept().await;
        read_message(&mut conn).await.unwrap();

        drop(conn);
        let exit = timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert_eq!(exit.unwrap(), ClientExit::ServerClosed);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_session() {
        let server = FakeServer::bind();
        let cancel_token = CancellationToken::new();
        let (_input, _output, handle) =
            spawn_client(server.transport.clone(), "alice", cancel_token.clone());
        let mut conn = server.accept().await;
        read_message(&mut conn).await.unwrap();

        cancel_token.cancel();
        let exit = timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert_eq!(exit.unwrap(), ClientExit::Interrupted);

        // The client hangs up on its way out.
        assert!(read_message(&mut conn).await.is_err());
    }
}
