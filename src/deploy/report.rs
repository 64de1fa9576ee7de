use crate::runner::CommandOutcome;
use crate::sync::SyncReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle of a single deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployState {
    Idle,
    FileSessionOpen,
    FullSync,
    EnvOnly,
    EnvWritten,
    FileSessionClosed,
    CommandSessionOpen,
    CommandsRunning,
    CommandSessionClosed,
    Done,
    Failed,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployReport {
    pub deployment_id: String,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub env_only: bool,
    pub sync: SyncReport,
    pub env_file: String,
    pub env_fields_written: Vec<String>,
    /// `None` when the command phase did not run.
    pub commands: Option<Vec<CommandOutcome>>,
}

impl DeployReport {
    pub fn failed_commands(&self) -> Vec<&CommandOutcome> {
        self.commands
            .iter()
            .flatten()
            .filter(|outcome| !outcome.succeeded())
            .collect()
    }
}
