//! Structured progress events emitted by a deployment run.
//!
//! Observers are sinks only; nothing they do feeds back into the run.

use crate::env::EnvValueSource;
use crate::transport::{FileOp, OutputStream};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    EnsureFolders,
    ClearFolders,
    DeleteFiles,
    DeleteDirs,
    Upload,
    Env,
    Commands,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::EnsureFolders => "ensure folders",
            Phase::ClearFolders => "clear folders",
            Phase::DeleteFiles => "delete files",
            Phase::DeleteDirs => "delete dirs",
            Phase::Upload => "upload",
            Phase::Env => "env",
            Phase::Commands => "commands",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeployEvent {
    PhaseStarted {
        phase: Phase,
    },
    RemoteCall {
        op: FileOp,
        path: String,
    },
    EnvResolved {
        field: String,
        source: EnvValueSource,
    },
    CommandStarted {
        command: String,
    },
    CommandOutput {
        command: String,
        stream: OutputStream,
        chunk: String,
    },
    CommandFinished {
        command: String,
        exit_code: Option<i32>,
    },
    Info {
        message: String,
    },
    Warn {
        message: String,
    },
    Error {
        message: String,
    },
    Success {
        message: String,
    },
}

pub trait DeployObserver: Send + Sync {
    fn on_event(&self, event: &DeployEvent);

    fn info(&self, message: String) {
        self.on_event(&DeployEvent::Info { message });
    }

    fn warn(&self, message: String) {
        self.on_event(&DeployEvent::Warn { message });
    }

    fn error(&self, message: String) {
        self.on_event(&DeployEvent::Error { message });
    }

    fn success(&self, message: String) {
        self.on_event(&DeployEvent::Success { message });
    }
}

/// Routes events onto `tracing` and prints command output on stdout so it
/// stays apart from the log stream.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl DeployObserver for TracingObserver {
    fn on_event(&self, event: &DeployEvent) {
        match event {
            DeployEvent::PhaseStarted { phase } => tracing::debug!("Starting phase: {}", phase),
            DeployEvent::RemoteCall { op, path } => tracing::debug!("{} {}", op, path),
            DeployEvent::EnvResolved { field, source } => {
                tracing::debug!("Env field {} resolved from {}", field, source)
            }
            DeployEvent::CommandStarted { command } => {
                tracing::info!("Executing command {} on remote", command)
            }
            DeployEvent::CommandOutput { chunk, .. } => {
                let mut stdout = std::io::stdout().lock();
                let _ = writeln!(stdout, "[$]: {chunk}");
            }
            DeployEvent::CommandFinished { command, exit_code } => match exit_code {
                Some(0) => tracing::debug!("Command {} finished", command),
                Some(code) => tracing::warn!("Command {} exited with status {}", command, code),
                None => tracing::warn!("Command {} finished without an exit status", command),
            },
            DeployEvent::Info { message } => tracing::info!("{}", message),
            DeployEvent::Warn { message } => tracing::warn!("{}", message),
            DeployEvent::Error { message } => tracing::error!("{}", message),
            DeployEvent::Success { message } => tracing::info!("✅ {}", message),
        }
    }
}

#[derive(Debug, Default)]
pub struct NullObserver;

impl DeployObserver for NullObserver {
    fn on_event(&self, _event: &DeployEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<DeployEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DeployEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn command_output(&self, command: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DeployEvent::CommandOutput {
                    command: ran,
                    chunk,
                    ..
                } if ran == command => Some(chunk),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DeployEvent::Error { message } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl DeployObserver for RecordingObserver {
    fn on_event(&self, event: &DeployEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
