use crate::types::{DeployManifest, RemoteTarget};
use clap::Parser;
use std::path::PathBuf;

/// Command-line interface; flags override the manifest.
#[derive(Debug, Parser)]
#[command(name = "remote-deploy")]
#[command(about = "Sync a project to a remote host, write its env file and run post-deploy commands")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct RemoteDeployCli {
    /// Deployment manifest (JSON or YAML). Defaults to deploy.json, deploy.yaml or deploy.yml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Local project root uploads are read from
    #[arg(long)]
    pub root_dir: Option<PathBuf>,

    /// Remote base directory every remote path is relative to
    #[arg(long)]
    pub remote_dir: Option<String>,

    /// Only rewrite the remote env file, skip the filesystem sync
    #[arg(long)]
    pub env_only: bool,

    /// Do not run post-deploy commands
    #[arg(long)]
    pub skip_post_commands: bool,

    /// Remote host
    #[arg(long)]
    pub host: Option<String>,

    /// Remote ssh port
    #[arg(long)]
    pub port: Option<u16>,

    /// Remote user
    #[arg(short, long)]
    pub user: Option<String>,

    /// Private key handed to ssh
    #[arg(short, long)]
    pub identity_file: Option<PathBuf>,

    /// Never prompt; env fields without a value are left out
    #[arg(long)]
    pub no_interactive: bool,

    /// Run against an in-memory remote and print the calls that would be made
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Explicit log level (trace, debug, info, warn, error); overrides -v
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<tracing::Level>,
}

impl RemoteDeployCli {
    pub fn apply_overrides(&self, manifest: &mut DeployManifest) {
        let options = &mut manifest.options;
        if let Some(root_dir) = &self.root_dir {
            options.root_dir = Some(root_dir.clone());
        }
        if let Some(remote_dir) = &self.remote_dir {
            options.remote_dir = Some(remote_dir.clone());
        }
        if self.env_only {
            options.only_update_env = Some(true);
        }
        if self.skip_post_commands {
            options.skip_post_commands = Some(true);
        }

        if let Some(host) = &self.host {
            match manifest.remote.as_mut() {
                Some(remote) => remote.host = host.clone(),
                None => manifest.remote = Some(RemoteTarget::new(host.clone())),
            }
        }
        if let Some(remote) = manifest.remote.as_mut() {
            if let Some(port) = self.port {
                remote.port = port;
            }
            if let Some(user) = &self.user {
                remote.username = Some(user.clone());
            }
            if let Some(identity_file) = &self.identity_file {
                remote.identity_file = Some(identity_file.clone());
            }
        }
    }

    pub fn log_level(&self) -> tracing::Level {
        if let Some(level) = self.log_level {
            return level;
        }
        match self.verbosity {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
