use crate::types::{
    DeletePaths, DeployOptions, DeploymentPlan, RunMode, DEFAULT_ENV_FILE, DEFAULT_ENV_PREFIX,
    DEFAULT_REMOTE_DIR,
};
use std::path::PathBuf;

/// Turn sparse options into a fully-defaulted plan. Never fails.
///
/// `cwd` is used when no root directory is given; callers normally pass
/// `std::env::current_dir()`.
pub fn resolve(options: &DeployOptions, cwd: PathBuf) -> DeploymentPlan {
    let delete_paths = options
        .delete_paths
        .as_ref()
        .map(|paths| DeletePaths {
            dirs: paths.dirs.clone().unwrap_or_default(),
            files: paths.files.clone().unwrap_or_default(),
        })
        .unwrap_or_default();

    DeploymentPlan {
        root_dir: options.root_dir.clone().unwrap_or(cwd),
        remote_dir: options
            .remote_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_REMOTE_DIR.to_string()),
        ensure_folders: options.ensure_folders.clone().unwrap_or_default(),
        clear_folders: options.clear_folders.clone().unwrap_or_default(),
        delete_paths,
        upload: options.upload.clone().unwrap_or_default(),
        commands: options.commands.clone().unwrap_or_default(),
        env_fields: options.env_fields.clone().unwrap_or_default(),
        env_prefix: options
            .env_prefix
            .clone()
            .unwrap_or_else(|| DEFAULT_ENV_PREFIX.to_string()),
        env_file: options
            .env_file
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENV_FILE.to_string()),
        mode: RunMode {
            only_update_env: options.only_update_env.unwrap_or(false),
            skip_post_commands: options.skip_post_commands.unwrap_or(false),
        },
    }
}

/// Resolve against the process working directory.
pub fn resolve_from_cwd(options: &DeployOptions) -> DeploymentPlan {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve(options, cwd)
}
