//! Integration tests running real clients against a real server.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::time::Duration;

use parlor_client::{ChatClient, ClientConfig, ClientExit, Result};
use parlor_protocol::Transport;
use parlord::config::ServerConfig;
use parlord::server::{ChatServer, Listener};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const LINE_TIMEOUT: Duration = Duration::from_secs(2);

/// A running client with handles on its input and rendered output.
struct TestUser {
    input: DuplexStream,
    output: BufReader<DuplexStream>,
    handle: JoinHandle<Result<ClientExit>>,
}

impl TestUser {
    fn spawn(transport: &Transport, name: &str) -> Self {
        let (input, input_rx) = tokio::io::duplex(1024);
        let (output_tx, output) = tokio::io::duplex(4096);
        let config = ClientConfig {
            transport: transport.clone(),
            ..ClientConfig::new(name)
        };
        let client = ChatClient::new(config, CancellationToken::new());
        let handle =
            tokio::spawn(async move { client.run(BufReader::new(input_rx), output_tx).await });
        Self {
            input,
            output: BufReader::new(output),
            handle,
        }
    }

    async fn type_line(&mut self, line: &str) {
        self.input.write_all(line.as_bytes()).await.unwrap();
        self.input.write_all(b"\n").await.unwrap();
    }

    /// Next rendered line, with the `[HH:MM:SS] ` prefix removed.
    async fn next_line(&mut self) -> String {
        let mut line = String::new();
        timeout(LINE_TIMEOUT, self.output.read_line(&mut line))
            .await
            .expect("output line in time")
            .expect("read output");
        let line = line.trim_end();
        match line.split_once("] ") {
            Some((_, rest)) => rest.to_string(),
            None => line.to_string(),
        }
    }

    async fn quit(self) -> ClientExit {
        drop(self.input);
        timeout(LINE_TIMEOUT, self.handle)
            .await
            .expect("client exited in time")
            .expect("client task")
            .expect("client result")
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_users_chat_through_server() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        transport: Transport::unix(temp_dir.path().join("chat.sock")),
        chat_log_path: temp_dir.path().join("chat.log"),
        ..ServerConfig::default()
    };
    let transport = config.transport.clone();
    let listener = Listener::bind(&transport).await.unwrap();
    let cancel_token = CancellationToken::new();
    let server = ChatServer::new(config, cancel_token.clone());
    let server_handle = tokio::spawn(async move { server.serve(listener).await });

    let mut alice = TestUser::spawn(&transport, "alice");
    assert_eq!(alice.next_line().await, "*** alice joined");

    let mut bob = TestUser::spawn(&transport, "bob");
    assert_eq!(bob.next_line().await, "*** bob joined");
    assert_eq!(alice.next_line().await, "*** bob joined");

    alice.type_line("hi everyone").await;
    assert_eq!(alice.next_line().await, "<alice> hi everyone");
    assert_eq!(bob.next_line().await, "<alice> hi everyone");

    bob.type_line("@alice just you").await;
    assert_eq!(bob.next_line().await, "(to alice) <bob> just you");
    assert_eq!(alice.next_line().await, "(private) <bob> just you");

    assert_eq!(bob.quit().await, ClientExit::InputClosed);
    assert_eq!(alice.next_line().await, "*** bob left (disconnected)");

    cancel_token.cancel();
    timeout(LINE_TIMEOUT, server_handle).await.unwrap().unwrap();
    let exit = timeout(LINE_TIMEOUT, alice.handle).await.unwrap().unwrap().unwrap();
    assert_eq!(exit, ClientExit::ServerClosed);
}
