//! Append-only chat transcript.
//!
//! The logger is the only consumer of the log queue. Every entry is flushed
//! as soon as it is written; a crash loses at most the entry being written.
//! Logging never affects delivery: if the transcript cannot be opened or
//! written, the logger closes its queue (so later messages are dropped rather
//! than piling up) and stops.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use parlor_protocol::ChatMessage;

use crate::queue::MessageQueue;

/// Errors writing the chat transcript.
#[derive(Debug, Error)]
pub enum ChatLogError {
    #[error("Failed to open chat log {path}: {error}")]
    Open { path: PathBuf, error: std::io::Error },

    #[error("Failed to write chat log {path}: {error}")]
    Write { path: PathBuf, error: std::io::Error },
}

/// Formats one transcript line, newline included.
///
/// `[HH:MM:SS] <sender> text` for broadcasts and
/// `[HH:MM:SS] <sender -> target> text` for targeted messages, in local time.
pub fn format_line(msg: &ChatMessage) -> String {
    let time = msg.timestamp().with_timezone(&Local).format("%H:%M:%S");
    format!("[{time}] {msg}\n")
}

/// Consumer of the log queue.
pub struct ChatLogger {
    queue: Arc<MessageQueue>,
    path: PathBuf,
}

impl ChatLogger {
    pub fn new(queue: Arc<MessageQueue>, path: impl Into<PathBuf>) -> Self {
        Self {
            queue,
            path: path.into(),
        }
    }

    /// Appends messages until the queue is closed and drained.
    ///
    /// On a storage error the queue is closed and the error returned.
    pub async fn run(self) -> Result<(), ChatLogError> {
        let result = self.append_all().await;
        if let Err(e) = &result {
            error!(error = %e, "Chat log disabled");
            self.queue.close();
        }
        result
    }

    async fn append_all(&self) -> Result<(), ChatLogError> {
        let mut file = self.open().await?;
        info!(path = %self.path.display(), "Chat logger started");

        let mut written: u64 = 0;
        while let Some(msg) = self.queue.pop().await {
            let line = format_line(&msg);
            let result = async {
                file.write_all(line.as_bytes()).await?;
                file.flush().await
            }
            .await;

            result.map_err(|error| ChatLogError::Write {
                path: self.path.clone(),
                error,
            })?;
            written += 1;
        }

        debug!(written, "Chat log queue closed");
        info!(path = %self.path.display(), "Chat logger stopped");
        Ok(())
    }

    async fn open(&self) -> Result<File, ChatLogError> {
        let open_error = |error| ChatLogError::Open {
            path: self.path.clone(),
            error,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(open_error)?;
            }
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(open_error)
    }
}

/// Spawns the chat logger task.
pub fn spawn_chat_logger(
    queue: Arc<MessageQueue>,
    path: impl Into<PathBuf>,
) -> JoinHandle<Result<(), ChatLogError>> {
    tokio::spawn(ChatLogger::new(queue, path).run())
}
