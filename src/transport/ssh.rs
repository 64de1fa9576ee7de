//! OpenSSH-backed transports.
//!
//! Each transport owns one multiplexed session: `connect` starts a
//! ControlMaster in a private temp directory, every later call rides on that
//! socket, and `disconnect` asks the master to exit.

use super::{
    join_remote, CommandStream, CommandTransport, FileTransport, OutputStream, Result,
    StreamEvent, TransportError,
};
use crate::types::RemoteTarget;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

struct SshSession {
    target: RemoteTarget,
    control_dir: Option<TempDir>,
}

impl SshSession {
    fn new(target: RemoteTarget) -> Self {
        Self {
            target,
            control_dir: None,
        }
    }

    fn control_path(&self) -> Result<PathBuf> {
        self.control_dir
            .as_ref()
            .map(|dir| dir.path().join("master.sock"))
            .ok_or(TransportError::NotConnected)
    }

    /// Port, identity and extra options for every ssh invocation.
    fn common_args(&self) -> Vec<String> {
        let mut args = vec!["-p".to_string(), self.target.port.to_string()];
        if let Some(identity) = &self.target.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        for option in &self.target.ssh_options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args
    }

    fn ssh(&self) -> Result<Command> {
        let control_path = self.control_path()?;
        let mut cmd = Command::new("ssh");
        cmd.args(self.common_args())
            .arg("-o")
            .arg(format!("ControlPath={}", control_path.display()))
            .arg(self.target.destination());
        Ok(cmd)
    }

    async fn connect(&mut self) -> Result<()> {
        if self.control_dir.is_some() {
            return Ok(());
        }
        let control_dir = tempfile::Builder::new()
            .prefix("remote-deploy-")
            .tempdir()?;
        let control_path = control_dir.path().join("master.sock");
        // The backgrounded master keeps inherited pipes open, so its
        // diagnostics go to a file instead.
        let log_path = control_dir.path().join("master.log");

        debug!("Opening ssh master connection to {}", self.target.host);
        let status = Command::new("ssh")
            .args(self.common_args())
            .arg("-M")
            .arg("-N")
            .arg("-f")
            .arg("-E")
            .arg(&log_path)
            .arg("-o")
            .arg("ControlPersist=yes")
            .arg("-o")
            .arg(format!("ControlPath={}", control_path.display()))
            .arg(self.target.destination())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|source| TransportError::Spawn {
                program: "ssh".to_string(),
                source,
            })?;

        if !status.success() {
            let stderr = tokio::fs::read_to_string(&log_path)
                .await
                .unwrap_or_default();
            return Err(TransportError::RemoteCommand {
                command: format!("ssh -M {}", self.target.destination()),
                status: status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        self.control_dir = Some(control_dir);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(control_dir) = self.control_dir.take() else {
            return Ok(());
        };
        let control_path = control_dir.path().join("master.sock");

        debug!("Closing ssh master connection to {}", self.target.host);
        let output = Command::new("ssh")
            .arg("-o")
            .arg(format!("ControlPath={}", control_path.display()))
            .arg("-O")
            .arg("exit")
            .arg(self.target.destination())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| TransportError::Spawn {
                program: "ssh".to_string(),
                source,
            })?;

        if !output.status.success() {
            warn!(
                "ssh master for {} did not exit cleanly: {}",
                self.target.host,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    /// Run a shell command on the remote and collect its output.
    async fn run(&self, remote_command: &str, stdin: Option<&[u8]>) -> Result<Output> {
        debug!("Executing command on {}: {}", self.target.host, remote_command);
        let mut cmd = self.ssh()?;
        cmd.arg(remote_command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn().map_err(|source| TransportError::Spawn {
            program: "ssh".to_string(),
            source,
        })?;

        if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(data).await?;
            pipe.shutdown().await?;
        }

        Ok(child.wait_with_output().await?)
    }

    /// Run a command that must succeed.
    async fn run_checked(&self, remote_command: &str, stdin: Option<&[u8]>) -> Result<()> {
        let output = self.run(remote_command, stdin).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(TransportError::RemoteCommand {
                command: remote_command.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

fn quote(path: &str) -> String {
    shell_words::quote(path).into_owned()
}

/// Remote command that replaces `remote` with whatever arrives on stdin.
fn write_command(remote: &str) -> String {
    format!("cat > {}", quote(remote))
}

/// File transport that manipulates the remote tree with coreutils over ssh
/// and streams uploads through `cat`.
pub struct SshFileTransport {
    session: SshSession,
    prefix: String,
}

impl SshFileTransport {
    pub fn new(target: RemoteTarget) -> Self {
        Self {
            session: SshSession::new(target),
            prefix: String::new(),
        }
    }

    fn remote(&self, path: &str) -> String {
        join_remote(&self.prefix, path)
    }
}

#[async_trait]
impl FileTransport for SshFileTransport {
    fn set_path_prefix(&mut self, prefix: &str) {
        self.prefix = prefix.to_string();
    }

    async fn connect(&mut self) -> Result<()> {
        self.session.connect().await
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.session.disconnect().await
    }

    async fn exists(&mut self, path: &str) -> Result<bool> {
        let command = format!("test -e {}", quote(&self.remote(path)));
        let output = self.session.run(&command, None).await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            status => Err(TransportError::RemoteCommand {
                command,
                status: status.unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    async fn create_dir(&mut self, path: &str) -> Result<()> {
        let command = format!("mkdir -p {}", quote(&self.remote(path)));
        self.session.run_checked(&command, None).await
    }

    async fn delete(&mut self, path: &str) -> Result<()> {
        let command = format!("rm -rf -- {}", quote(&self.remote(path)));
        self.session.run_checked(&command, None).await
    }

    async fn delete_dir(&mut self, path: &str) -> Result<()> {
        let command = format!("rm -rf -- {}", quote(&self.remote(path)));
        self.session.run_checked(&command, None).await
    }

    async fn upload_file(&mut self, local_path: &Path, remote_path: &str) -> Result<()> {
        let contents =
            tokio::fs::read(local_path)
                .await
                .map_err(|source| TransportError::LocalFile {
                    path: local_path.to_path_buf(),
                    source,
                })?;

        let remote = self.remote(remote_path);
        if let Some((parent, _)) = remote.rsplit_once('/') {
            if !parent.is_empty() {
                let command = format!("mkdir -p {}", quote(parent));
                self.session.run_checked(&command, None).await?;
            }
        }

        self.session
            .run_checked(&write_command(&remote), Some(&contents))
            .await
    }

    async fn create_file(&mut self, remote_path: &str, contents: &str) -> Result<()> {
        let command = write_command(&self.remote(remote_path));
        self.session
            .run_checked(&command, Some(contents.as_bytes()))
            .await
    }
}

/// Forward a command's output as `Data` events, one per line. Bytes that are
/// not UTF-8 are replaced so the rest of the output still gets through.
async fn forward_lines<R>(reader: Option<R>, stream: OutputStream, tx: mpsc::Sender<StreamEvent>)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                let event = StreamEvent::Data {
                    stream,
                    chunk: String::from_utf8_lossy(&buf).into_owned(),
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Error(format!("failed to read {stream:?}: {e}")))
                    .await;
                break;
            }
        }
    }
}

/// Command transport that runs each command through its own ssh channel on
/// the shared master connection.
pub struct SshCommandTransport {
    session: SshSession,
}

impl SshCommandTransport {
    pub fn new(target: RemoteTarget) -> Self {
        Self {
            session: SshSession::new(target),
        }
    }
}

#[async_trait]
impl CommandTransport for SshCommandTransport {
    async fn connect(&mut self) -> Result<()> {
        self.session.connect().await
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.session.disconnect().await
    }

    async fn spawn(&mut self, command: &str) -> Result<CommandStream> {
        let mut cmd = self.session.ssh()?;
        cmd.arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| TransportError::Spawn {
            program: "ssh".to_string(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (tx, stream) = CommandStream::channel();

        tokio::spawn(async move {
            let stdout_task = tokio::spawn(forward_lines(stdout, OutputStream::Stdout, tx.clone()));
            let stderr_task = tokio::spawn(forward_lines(stderr, OutputStream::Stderr, tx.clone()));

            let _ = stdout_task.await;
            let _ = stderr_task.await;

            let status = tokio::select! {
                _ = tx.closed() => {
                    let _ = child.kill().await;
                    return;
                }
                status = child.wait() => status,
            };
            let exit_code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    let _ = tx
                        .send(StreamEvent::Error(format!("failed to wait for ssh: {e}")))
                        .await;
                    None
                }
            };
            let _ = tx.send(StreamEvent::Closed { exit_code }).await;
        });

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> RemoteTarget {
        RemoteTarget {
            host: "example.org".to_string(),
            port: 2222,
            username: Some("deploy".to_string()),
            identity_file: Some(PathBuf::from("/home/deploy/.ssh/id_ed25519")),
            ssh_options: vec!["StrictHostKeyChecking=accept-new".to_string()],
        }
    }

    #[test]
    fn test_common_args() {
        let session = SshSession::new(target());
        assert_eq!(
            session.common_args(),
            vec![
                "-p",
                "2222",
                "-i",
                "/home/deploy/.ssh/id_ed25519",
                "-o",
                "StrictHostKeyChecking=accept-new",
            ]
        );
    }

    #[test]
    fn test_commands_require_connection() {
        let session = SshSession::new(target());
        assert!(matches!(session.ssh(), Err(TransportError::NotConnected)));
    }

    #[test]
    fn test_remote_paths_are_prefixed_and_quoted() {
        let mut transport = SshFileTransport::new(target());
        transport.set_path_prefix("/var/www/html");
        let remote = transport.remote("my logs");
        assert_eq!(remote, "/var/www/html/my logs");
        assert_eq!(quote(&remote), "'/var/www/html/my logs'");
    }

    #[test]
    fn test_write_command_quotes_paths_with_spaces() {
        assert_eq!(
            write_command("/var/www/html/my assets/app.js"),
            "cat > '/var/www/html/my assets/app.js'"
        );
        assert_eq!(write_command("/srv/.env"), "cat > /srv/.env");
    }

    #[tokio::test]
    async fn test_upload_of_missing_local_file_fails_before_remote_calls() {
        let mut transport = SshFileTransport::new(target());
        transport.set_path_prefix("/srv");
        let result = transport
            .upload_file(Path::new("/nonexistent/remote-deploy/app.js"), "my assets/app.js")
            .await;
        assert!(matches!(result, Err(TransportError::LocalFile { .. })));
    }

    async fn collect(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn stdout(chunk: &str) -> StreamEvent {
        StreamEvent::Data {
            stream: OutputStream::Stdout,
            chunk: chunk.to_string(),
        }
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_end_output() {
        let output: &[u8] = b"before\n\xff\xfe bad bytes\r\nLAST";
        let (tx, rx) = mpsc::channel(16);
        forward_lines(Some(output), OutputStream::Stdout, tx).await;

        assert_eq!(
            collect(rx).await,
            vec![
                stdout("before"),
                stdout("\u{FFFD}\u{FFFD} bad bytes"),
                stdout("LAST"),
            ]
        );
    }

    #[tokio::test]
    async fn test_read_error_is_reported() {
        let output = tokio_test::io::Builder::new()
            .read(b"first\n")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "pipe closed",
            ))
            .build();
        let (tx, rx) = mpsc::channel(16);
        forward_lines(Some(output), OutputStream::Stdout, tx).await;

        let events = collect(rx).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], stdout("first"));
        assert!(matches!(&events[1], StreamEvent::Error(message) if message.contains("pipe closed")));
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_noop() {
        let mut transport = SshCommandTransport::new(target());
        transport.disconnect().await.unwrap();
    }
}
