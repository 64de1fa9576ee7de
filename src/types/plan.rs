use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_REMOTE_DIR: &str = "/var/www/html";
pub const DEFAULT_ENV_PREFIX: &str = "PROD_";
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Fully-defaulted deployment plan.
///
/// Produced once by the configuration resolver and never mutated afterwards;
/// the clear-folder working list lives in the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub root_dir: PathBuf,
    pub remote_dir: String,
    pub ensure_folders: Vec<String>,
    pub clear_folders: Vec<String>,
    pub delete_paths: DeletePaths,
    pub upload: Vec<String>,
    pub commands: Vec<String>,
    pub env_fields: Vec<String>,
    pub env_prefix: String,
    pub env_file: String,
    pub mode: RunMode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePaths {
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

/// Run-mode flags supplied next to the plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMode {
    /// Skip the filesystem synchronizer; the env file is still written.
    pub only_update_env: bool,
    /// Never open the command session.
    pub skip_post_commands: bool,
}

impl DeploymentPlan {
    /// Local path of an upload entry.
    pub fn local_path(&self, relative: &str) -> PathBuf {
        self.root_dir.join(relative)
    }
}
