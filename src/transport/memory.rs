//! In-memory transports that keep a call log.
//!
//! Used by `--dry-run` and by tests to observe the exact sequence of remote
//! operations without a reachable host.

use super::{
    join_remote, CommandStream, CommandTransport, FileOp, FileTransport, Result, StreamEvent,
    TransportError,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    SetPathPrefix(String),
    Connect,
    Disconnect,
    Exists(String),
    CreateDir(String),
    Delete(String),
    DeleteDir(String),
    UploadFile { local: PathBuf, remote: String },
    CreateFile { path: String, contents: String },
}

/// Remote tree held in memory. Paths are stored fully joined with the
/// current prefix.
#[derive(Debug, Default)]
pub struct MemoryFileTransport {
    prefix: String,
    connected: bool,
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    calls: Vec<TransportCall>,
    failures: Vec<(FileOp, Option<String>)>,
}

impl MemoryFileTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing remote directory (absolute path).
    pub fn with_dir(mut self, path: &str) -> Self {
        self.insert_dir(path.to_string());
        self
    }

    /// Seed an existing remote file (absolute path).
    pub fn with_file(mut self, path: &str, contents: &str) -> Self {
        if let Some((parent, _)) = path.rsplit_once('/') {
            if !parent.is_empty() {
                self.insert_dir(parent.to_string());
            }
        }
        self.files.insert(path.to_string(), contents.as_bytes().to_vec());
        self
    }

    /// Make `op` fail, either for one remote-relative path or for every call.
    pub fn fail_on(mut self, op: FileOp, path: Option<&str>) -> Self {
        self.failures.push((op, path.map(str::to_string)));
        self
    }

    pub fn calls(&self) -> &[TransportCall] {
        &self.calls
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn dir_exists(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }

    pub fn file_contents(&self, path: &str) -> Option<String> {
        self.files
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn dirs(&self) -> impl Iterator<Item = &str> {
        self.dirs.iter().map(String::as_str)
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    fn insert_dir(&mut self, path: String) {
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if path.starts_with('/') || !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);
            self.dirs.insert(current.clone());
        }
    }

    fn remove_tree(&mut self, path: &str) {
        let nested = format!("{}/", path.trim_end_matches('/'));
        self.dirs
            .retain(|dir| dir != path && !dir.starts_with(&nested));
        self.files
            .retain(|file, _| file != path && !file.starts_with(&nested));
    }

    fn check(&self, op: FileOp, path: Option<&str>) -> Result<()> {
        let rejected = self.failures.iter().any(|(failing, target)| {
            *failing == op
                && match target {
                    Some(target) => Some(target.as_str()) == path,
                    None => true,
                }
        });
        if rejected {
            return Err(TransportError::Rejected(format!(
                "{op} rejected for {}",
                path.unwrap_or("<session>")
            )));
        }
        if !self.connected && !matches!(op, FileOp::Connect | FileOp::Disconnect) {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }
}

#[async_trait]
impl FileTransport for MemoryFileTransport {
    fn set_path_prefix(&mut self, prefix: &str) {
        self.calls.push(TransportCall::SetPathPrefix(prefix.to_string()));
        self.prefix = prefix.to_string();
    }

    async fn connect(&mut self) -> Result<()> {
        self.calls.push(TransportCall::Connect);
        self.check(FileOp::Connect, None)?;
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.calls.push(TransportCall::Disconnect);
        self.check(FileOp::Disconnect, None)?;
        self.connected = false;
        Ok(())
    }

    async fn exists(&mut self, path: &str) -> Result<bool> {
        self.calls.push(TransportCall::Exists(path.to_string()));
        self.check(FileOp::Exists, Some(path))?;
        let full = join_remote(&self.prefix, path);
        Ok(self.dirs.contains(&full) || self.files.contains_key(&full))
    }

    async fn create_dir(&mut self, path: &str) -> Result<()> {
        self.calls.push(TransportCall::CreateDir(path.to_string()));
        self.check(FileOp::CreateDir, Some(path))?;
        let full = join_remote(&self.prefix, path);
        self.insert_dir(full);
        Ok(())
    }

    async fn delete(&mut self, path: &str) -> Result<()> {
        self.calls.push(TransportCall::Delete(path.to_string()));
        self.check(FileOp::Delete, Some(path))?;
        let full = join_remote(&self.prefix, path);
        self.remove_tree(&full);
        Ok(())
    }

    async fn delete_dir(&mut self, path: &str) -> Result<()> {
        self.calls.push(TransportCall::DeleteDir(path.to_string()));
        self.check(FileOp::DeleteDir, Some(path))?;
        let full = join_remote(&self.prefix, path);
        self.remove_tree(&full);
        Ok(())
    }

    async fn upload_file(&mut self, local_path: &Path, remote_path: &str) -> Result<()> {
        self.calls.push(TransportCall::UploadFile {
            local: local_path.to_path_buf(),
            remote: remote_path.to_string(),
        });
        self.check(FileOp::UploadFile, Some(remote_path))?;
        let contents =
            tokio::fs::read(local_path)
                .await
                .map_err(|source| TransportError::LocalFile {
                    path: local_path.to_path_buf(),
                    source,
                })?;
        let full = join_remote(&self.prefix, remote_path);
        if let Some((parent, _)) = full.rsplit_once('/') {
            if !parent.is_empty() {
                self.insert_dir(parent.to_string());
            }
        }
        self.files.insert(full, contents);
        Ok(())
    }

    async fn create_file(&mut self, remote_path: &str, contents: &str) -> Result<()> {
        self.calls.push(TransportCall::CreateFile {
            path: remote_path.to_string(),
            contents: contents.to_string(),
        });
        self.check(FileOp::CreateFile, Some(remote_path))?;
        let full = join_remote(&self.prefix, remote_path);
        self.files.insert(full, contents.as_bytes().to_vec());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandCall {
    Connect,
    Disconnect,
    Spawn(String),
    /// Logged by the stream feeder right before it delivers `Closed`.
    Completed(String),
}

/// Command transport with scripted output per command. Commands without a
/// script print nothing and exit 0.
#[derive(Debug, Clone, Default)]
pub struct MemoryCommandTransport {
    connected: bool,
    scripts: HashMap<String, Vec<StreamEvent>>,
    refuse_spawn: BTreeSet<String>,
    refuse_connect: bool,
    calls: Arc<Mutex<Vec<CommandCall>>>,
}

impl MemoryCommandTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events the stream for `command` delivers. A trailing `Closed` is
    /// appended when the script does not end with one.
    pub fn script(mut self, command: &str, events: Vec<StreamEvent>) -> Self {
        self.scripts.insert(command.to_string(), events);
        self
    }

    pub fn refuse_spawn(mut self, command: &str) -> Self {
        self.refuse_spawn.insert(command.to_string());
        self
    }

    pub fn refuse_connect(mut self) -> Self {
        self.refuse_connect = true;
        self
    }

    pub fn calls(&self) -> Vec<CommandCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn record(calls: &Mutex<Vec<CommandCall>>, call: CommandCall) {
        if let Ok(mut calls) = calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl CommandTransport for MemoryCommandTransport {
    async fn connect(&mut self) -> Result<()> {
        Self::record(&self.calls, CommandCall::Connect);
        if self.refuse_connect {
            return Err(TransportError::Rejected("connect refused".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        Self::record(&self.calls, CommandCall::Disconnect);
        self.connected = false;
        Ok(())
    }

    async fn spawn(&mut self, command: &str) -> Result<CommandStream> {
        Self::record(&self.calls, CommandCall::Spawn(command.to_string()));
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if self.refuse_spawn.contains(command) {
            return Err(TransportError::Rejected(format!(
                "spawn refused for `{command}`"
            )));
        }

        let mut events = self.scripts.get(command).cloned().unwrap_or_default();
        if !matches!(events.last(), Some(StreamEvent::Closed { .. })) {
            events.push(StreamEvent::Closed { exit_code: Some(0) });
        }

        let (tx, stream) = CommandStream::channel();
        let calls = Arc::clone(&self.calls);
        let command = command.to_string();
        tokio::spawn(async move {
            for event in events {
                tokio::task::yield_now().await;
                if matches!(event, StreamEvent::Closed { .. }) {
                    Self::record(&calls, CommandCall::Completed(command.clone()));
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tree_operations_under_prefix() {
        let mut transport = MemoryFileTransport::new().with_dir("/srv/app/cache");
        transport.set_path_prefix("/srv/app");
        transport.connect().await.unwrap();

        assert!(transport.exists("cache").await.unwrap());
        assert!(!transport.exists("logs").await.unwrap());

        transport.create_dir("logs/nested").await.unwrap();
        assert!(transport.dir_exists("/srv/app/logs"));
        assert!(transport.dir_exists("/srv/app/logs/nested"));

        transport.create_file("logs/nested/a.txt", "a").await.unwrap();
        transport.delete_dir("logs").await.unwrap();
        assert!(!transport.dir_exists("/srv/app/logs/nested"));
        assert!(transport.file_contents("/srv/app/logs/nested/a.txt").is_none());
    }

    #[tokio::test]
    async fn test_delete_absent_is_noop() {
        let mut transport = MemoryFileTransport::new();
        transport.set_path_prefix("/srv");
        transport.connect().await.unwrap();

        transport.delete("missing").await.unwrap();
        transport.delete_dir("missing-dir").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_removes_only_the_target_tree() {
        let mut transport = MemoryFileTransport::new()
            .with_file("/srv/logs/a.log", "a")
            .with_file("/srv/logs2/b.log", "b")
            .with_file("/srv/logs", "")
            .with_dir("/srv/logs/nested");
        transport.set_path_prefix("/srv");
        transport.connect().await.unwrap();

        transport.delete("logs").await.unwrap();

        assert!(transport.file_contents("/srv/logs").is_none());
        assert!(transport.file_contents("/srv/logs/a.log").is_none());
        assert!(!transport.dir_exists("/srv/logs/nested"));
        assert_eq!(transport.file_contents("/srv/logs2/b.log").as_deref(), Some("b"));
        assert!(transport.dir_exists("/srv/logs2"));
    }

    #[tokio::test]
    async fn test_calls_require_connection() {
        let mut transport = MemoryFileTransport::new();
        let result = transport.exists("logs").await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn test_injected_failure_matches_path() {
        let mut transport = MemoryFileTransport::new().fail_on(FileOp::Delete, Some("cache"));
        transport.connect().await.unwrap();

        transport.delete("other").await.unwrap();
        let result = transport.delete("cache").await;
        assert!(matches!(result, Err(TransportError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_scripted_command_stream() {
        let mut transport = MemoryCommandTransport::new().script(
            "echo hi",
            vec![StreamEvent::Data {
                stream: crate::transport::OutputStream::Stdout,
                chunk: "hi\n".to_string(),
            }],
        );
        transport.connect().await.unwrap();

        let mut stream = transport.spawn("echo hi").await.unwrap();
        let mut events = Vec::new();
        while let Some(event) = stream.next_event().await {
            events.push(event);
        }

        assert_eq!(events.len(), 2);
        assert_eq!(events[1], StreamEvent::Closed { exit_code: Some(0) });
        assert_eq!(
            transport.calls(),
            vec![
                CommandCall::Connect,
                CommandCall::Spawn("echo hi".to_string()),
                CommandCall::Completed("echo hi".to_string()),
            ]
        );
    }
}
