//! Remote collaborators consumed by the orchestrator.
//!
//! Two independent sessions are modelled: a file transport that manipulates
//! the remote tree beneath a path prefix, and a command transport that runs
//! shell commands and streams their output back.

pub mod error;
pub mod memory;
pub mod ssh;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::sync::mpsc;

pub use error::{Result, TransportError};
pub use memory::{CommandCall, MemoryCommandTransport, MemoryFileTransport, TransportCall};
pub use ssh::{SshCommandTransport, SshFileTransport};

/// Remote filesystem session. Every remote path is relative to the prefix
/// set with [`FileTransport::set_path_prefix`].
#[async_trait]
pub trait FileTransport: Send {
    fn set_path_prefix(&mut self, prefix: &str);

    async fn connect(&mut self) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    async fn exists(&mut self, path: &str) -> Result<bool>;

    async fn create_dir(&mut self, path: &str) -> Result<()>;

    /// Remove a path. Removing an absent path is a no-op.
    async fn delete(&mut self, path: &str) -> Result<()>;

    /// Recursively remove a directory.
    async fn delete_dir(&mut self, path: &str) -> Result<()>;

    async fn upload_file(&mut self, local_path: &Path, remote_path: &str) -> Result<()>;

    /// Write `contents` to `remote_path`, replacing any existing file.
    async fn create_file(&mut self, remote_path: &str, contents: &str) -> Result<()>;
}

/// Remote command session.
#[async_trait]
pub trait CommandTransport: Send {
    async fn connect(&mut self) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    async fn spawn(&mut self, command: &str) -> Result<CommandStream>;
}

/// Operations issued against the file transport, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileOp {
    Connect,
    Disconnect,
    Exists,
    CreateDir,
    Delete,
    DeleteDir,
    UploadFile,
    CreateFile,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileOp::Connect => "connect",
            FileOp::Disconnect => "disconnect",
            FileOp::Exists => "exists",
            FileOp::CreateDir => "create_dir",
            FileOp::Delete => "delete",
            FileOp::DeleteDir => "delete_dir",
            FileOp::UploadFile => "upload_file",
            FileOp::CreateFile => "create_file",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Events produced by a spawned remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Data { stream: OutputStream, chunk: String },
    Error(String),
    /// Terminal event; nothing follows it.
    Closed { exit_code: Option<i32> },
}

/// Receiving half of a remote command's event stream.
#[derive(Debug)]
pub struct CommandStream {
    events: mpsc::Receiver<StreamEvent>,
}

impl CommandStream {
    pub const BUFFER: usize = 64;

    /// Create a stream along with the sender a transport feeds it through.
    pub fn channel() -> (mpsc::Sender<StreamEvent>, CommandStream) {
        let (tx, rx) = mpsc::channel(Self::BUFFER);
        (tx, CommandStream { events: rx })
    }

    /// Next event, or `None` once every sender is gone.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }
}

/// Join a remote-relative path onto a prefix.
pub fn join_remote(prefix: &str, path: &str) -> String {
    let path = path.trim_start_matches("./").trim_start_matches('/');
    if prefix.is_empty() {
        return path.to_string();
    }
    let prefix = prefix.trim_end_matches('/');
    if path.is_empty() || path == "." {
        if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }
    } else {
        format!("{prefix}/{path}")
    }
}
