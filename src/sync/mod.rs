//! Remote filesystem synchronization.
//!
//! Phases run in a fixed order over one file session: ensure, clear,
//! delete files, delete dirs, upload. Every call is awaited before the next
//! one is issued and the first failure stops the run.

use crate::deploy::{DeployError, Result};
use crate::observer::{DeployEvent, DeployObserver, Phase};
use crate::transport::{FileOp, FileTransport};
use crate::types::DeploymentPlan;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What the synchronizer changed on the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub cleared: Vec<String>,
    pub deleted_files: Vec<String>,
    pub deleted_dirs: Vec<String>,
    pub uploaded: Vec<String>,
}

/// Clear-list entries still to clear once `created` folders are known.
/// Freshly created folders are empty already; matching is exact.
pub fn pending_clears(clear_folders: &[String], created: &[String]) -> Vec<String> {
    let created: HashSet<&str> = created.iter().map(String::as_str).collect();
    clear_folders
        .iter()
        .filter(|folder| !created.contains(folder.as_str()))
        .cloned()
        .collect()
}

pub struct FilesystemSynchronizer<'a> {
    plan: &'a DeploymentPlan,
    observer: &'a dyn DeployObserver,
}

impl<'a> FilesystemSynchronizer<'a> {
    pub fn new(plan: &'a DeploymentPlan, observer: &'a dyn DeployObserver) -> Self {
        Self { plan, observer }
    }

    pub async fn run(&self, file: &mut dyn FileTransport) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        report.created = self.ensure_folders(file).await?;

        let clear_folders = pending_clears(&self.plan.clear_folders, &report.created);
        self.phase(Phase::ClearFolders);
        for folder in clear_folders {
            self.observer
                .info(format!("clearing folder {folder} on the remote."));
            self.call(FileOp::Delete, &folder);
            file.delete(&folder)
                .await
                .map_err(DeployError::transport(FileOp::Delete, &folder))?;
            self.call(FileOp::CreateDir, &folder);
            file.create_dir(&folder)
                .await
                .map_err(DeployError::transport(FileOp::CreateDir, &folder))?;
            report.cleared.push(folder);
        }

        self.phase(Phase::DeleteFiles);
        for path in &self.plan.delete_paths.files {
            self.observer
                .info(format!("deleting file {path} on the remote."));
            self.call(FileOp::Delete, path);
            file.delete(path)
                .await
                .map_err(DeployError::transport(FileOp::Delete, path))?;
            report.deleted_files.push(path.clone());
        }

        self.phase(Phase::DeleteDirs);
        for path in &self.plan.delete_paths.dirs {
            self.observer
                .info(format!("deleting dir {path} on the remote."));
            self.call(FileOp::DeleteDir, path);
            file.delete_dir(path)
                .await
                .map_err(DeployError::transport(FileOp::DeleteDir, path))?;
            report.deleted_dirs.push(path.clone());
        }

        self.phase(Phase::Upload);
        for path in &self.plan.upload {
            self.observer
                .info(format!("uploading {path} to the remote."));
            let local = self.plan.local_path(path);
            self.call(FileOp::UploadFile, path);
            file.upload_file(&local, path)
                .await
                .map_err(DeployError::transport(FileOp::UploadFile, path))?;
            report.uploaded.push(path.clone());
        }

        Ok(report)
    }

    /// Create every missing ensure-folder; returns the ones created.
    async fn ensure_folders(&self, file: &mut dyn FileTransport) -> Result<Vec<String>> {
        self.phase(Phase::EnsureFolders);
        let mut created = Vec::new();
        for folder in &self.plan.ensure_folders {
            self.call(FileOp::Exists, folder);
            let exists = file
                .exists(folder)
                .await
                .map_err(DeployError::transport(FileOp::Exists, folder))?;
            if exists {
                continue;
            }

            self.observer
                .info(format!("creating folder {folder} on the remote."));
            self.call(FileOp::CreateDir, folder);
            file.create_dir(folder)
                .await
                .map_err(DeployError::transport(FileOp::CreateDir, folder))?;
            created.push(folder.clone());
        }
        Ok(created)
    }

    fn phase(&self, phase: Phase) {
        self.observer.on_event(&DeployEvent::PhaseStarted { phase });
    }

    fn call(&self, op: FileOp, path: &str) {
        self.observer.on_event(&DeployEvent::RemoteCall {
            op,
            path: path.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pending_clears_removes_created() {
        let clear = strings(&["logs", "cache", "logs"]);
        let created = strings(&["logs"]);
        assert_eq!(pending_clears(&clear, &created), strings(&["cache"]));
    }

    #[test]
    fn test_pending_clears_exact_match_only() {
        let clear = strings(&["logs/", "./logs", "Logs"]);
        let created = strings(&["logs"]);
        assert_eq!(pending_clears(&clear, &created), clear);
    }

    #[test]
    fn test_pending_clears_keeps_order() {
        let clear = strings(&["c", "b", "a"]);
        assert_eq!(pending_clears(&clear, &[]), clear);
    }
}
