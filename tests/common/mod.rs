//! Shared fixtures for deployment integration tests

#![allow(dead_code)]

use remote_deploy::config::resolve;
use remote_deploy::types::{DeletePathsOptions, DeployOptions, DeploymentPlan};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const REMOTE: &str = "/var/www/html";

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Local project with a couple of files to upload.
pub fn project() -> TempDir {
    let dir = TempDir::new().expect("Failed to create project directory");
    fs::write(dir.path().join("index.html"), "<h1>hello</h1>").unwrap();
    fs::create_dir_all(dir.path().join("assets")).unwrap();
    fs::write(dir.path().join("assets/app.js"), "console.log(1)").unwrap();
    dir
}

/// Plan from the end-to-end scenario: one ensure folder that is also in
/// the clear list, one upload, one env field and one command.
pub fn scenario_plan(root: &Path) -> DeploymentPlan {
    let options = DeployOptions {
        root_dir: Some(root.to_path_buf()),
        ensure_folders: Some(strings(&["logs"])),
        clear_folders: Some(strings(&["logs", "cache"])),
        upload: Some(strings(&["index.html"])),
        env_fields: Some(strings(&["DB_HOST"])),
        commands: Some(strings(&["echo hi"])),
        ..Default::default()
    };
    resolve(&options, root.to_path_buf())
}

/// Plan touching every synchronizer phase.
pub fn full_plan(root: &Path) -> DeploymentPlan {
    let options = DeployOptions {
        root_dir: Some(root.to_path_buf()),
        ensure_folders: Some(strings(&["logs", "storage"])),
        clear_folders: Some(strings(&["cache", "logs"])),
        delete_paths: Some(DeletePathsOptions {
            dirs: Some(strings(&["tmp"])),
            files: Some(strings(&["stale.txt"])),
        }),
        upload: Some(strings(&["index.html", "assets/app.js"])),
        env_fields: Some(strings(&["APP_ENV"])),
        ..Default::default()
    };
    resolve(&options, root.to_path_buf())
}
