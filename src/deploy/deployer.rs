use crate::deploy::{DeployError, DeployReport, DeployState, Result};
use crate::env::{render, EnvResolver, EnvSource, PromptProvider};
use crate::observer::{DeployEvent, DeployObserver, Phase};
use crate::runner::{CommandOutcome, CommandRunner};
use crate::sync::{FilesystemSynchronizer, SyncReport};
use crate::transport::{CommandTransport, FileOp, FileTransport};
use crate::types::DeploymentPlan;
use chrono::Utc;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Drives one deployment run: file session (sync + env file), then the
/// optional command session.
///
/// Sessions are borrowed; the deployer opens and closes them and releases
/// an open session on every exit path.
pub struct Deployer<'a> {
    plan: DeploymentPlan,
    file: &'a mut dyn FileTransport,
    commands: Option<&'a mut dyn CommandTransport>,
    env: &'a dyn EnvSource,
    prompt: &'a dyn PromptProvider,
    observer: &'a dyn DeployObserver,
    state: DeployState,
}

impl<'a> Deployer<'a> {
    /// Points the file transport at the plan's remote base before anything
    /// else is issued.
    pub fn new(
        plan: DeploymentPlan,
        file: &'a mut dyn FileTransport,
        env: &'a dyn EnvSource,
        prompt: &'a dyn PromptProvider,
        observer: &'a dyn DeployObserver,
    ) -> Self {
        file.set_path_prefix(&plan.remote_dir);
        Self {
            plan,
            file,
            commands: None,
            env,
            prompt,
            observer,
            state: DeployState::Idle,
        }
    }

    pub fn with_command_transport(mut self, commands: &'a mut dyn CommandTransport) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn plan(&self) -> &DeploymentPlan {
        &self.plan
    }

    pub fn state(&self) -> DeployState {
        self.state
    }

    pub async fn run(&mut self) -> Result<DeployReport> {
        if self.state != DeployState::Idle {
            return Err(DeployError::AlreadyRun);
        }

        let started = Instant::now();
        let started_at = Utc::now();
        let deployment_id = Uuid::new_v4().to_string();
        debug!("Starting deployment {}", deployment_id);

        let (sync, env_fields_written) = match self.file_session().await {
            Ok(result) => result,
            Err(e) => {
                self.state = DeployState::Failed;
                self.observer.error(e.to_string());
                return Err(e);
            }
        };

        let commands = match self.command_session().await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                self.state = DeployState::Failed;
                self.observer.error(e.to_string());
                return Err(e);
            }
        };

        self.state = DeployState::Done;
        let duration = started.elapsed();
        self.observer
            .success(format!("deploy done in {}ms", duration.as_millis()));

        Ok(DeployReport {
            deployment_id,
            started_at,
            duration,
            env_only: self.plan.mode.only_update_env,
            sync,
            env_file: self.plan.env_file.clone(),
            env_fields_written,
            commands,
        })
    }

    async fn file_session(&mut self) -> Result<(SyncReport, Vec<String>)> {
        self.observer.info("connecting to file remote.".to_string());
        self.file
            .connect()
            .await
            .map_err(DeployError::transport(FileOp::Connect, &self.plan.remote_dir))?;
        self.state = DeployState::FileSessionOpen;
        self.observer.success("connected.".to_string());

        let result = self.file_phases().await;
        if result.is_err() {
            self.release_file_session().await;
            return result;
        }

        self.file
            .disconnect()
            .await
            .map_err(DeployError::transport(FileOp::Disconnect, &self.plan.remote_dir))?;
        self.state = DeployState::FileSessionClosed;
        self.observer
            .success("disconnected from file remote.".to_string());
        result
    }

    async fn file_phases(&mut self) -> Result<(SyncReport, Vec<String>)> {
        let sync = if self.plan.mode.only_update_env {
            self.state = DeployState::EnvOnly;
            self.observer
                .info("env-only mode, skipping filesystem sync.".to_string());
            SyncReport::default()
        } else {
            self.state = DeployState::FullSync;
            FilesystemSynchronizer::new(&self.plan, self.observer)
                .run(&mut *self.file)
                .await?
        };

        let written = self.write_env_file().await?;
        self.state = DeployState::EnvWritten;
        Ok((sync, written))
    }

    /// Resolve every env field and overwrite the remote env file, even when
    /// nothing resolved.
    async fn write_env_file(&mut self) -> Result<Vec<String>> {
        self.observer.on_event(&DeployEvent::PhaseStarted { phase: Phase::Env });
        self.observer.info("configuring env...".to_string());

        let resolver = EnvResolver::new(&self.plan.env_prefix, self.env, self.prompt);
        let lines = resolver
            .resolve_all(&self.plan.env_fields, self.observer)
            .await?;
        let contents = render(&lines);

        let env_file = self.plan.env_file.clone();
        self.observer.on_event(&DeployEvent::RemoteCall {
            op: FileOp::CreateFile,
            path: env_file.clone(),
        });
        self.file
            .create_file(&env_file, &contents)
            .await
            .map_err(DeployError::transport(FileOp::CreateFile, &env_file))?;

        Ok(lines.into_iter().map(|line| line.key).collect())
    }

    async fn release_file_session(&mut self) {
        if let Err(e) = self.file.disconnect().await {
            self.observer
                .warn(format!("failed to disconnect file remote after error: {e}"));
        }
    }

    async fn command_session(&mut self) -> Result<Option<Vec<CommandOutcome>>> {
        if self.plan.mode.skip_post_commands {
            if !self.plan.commands.is_empty() {
                self.observer
                    .info("skipping post-deploy commands.".to_string());
            }
            return Ok(None);
        }
        let Some(transport) = self.commands.as_deref_mut() else {
            if !self.plan.commands.is_empty() {
                self.observer.warn(format!(
                    "{} post-deploy command(s) declared but no command remote configured.",
                    self.plan.commands.len()
                ));
            }
            return Ok(None);
        };

        self.observer.info("connecting to cmd remote.".to_string());
        transport
            .connect()
            .await
            .map_err(|source| DeployError::CommandSession {
                operation: "connect",
                source,
            })?;
        self.state = DeployState::CommandSessionOpen;
        self.observer.success("connected.".to_string());

        self.state = DeployState::CommandsRunning;
        let outcomes = CommandRunner::new(self.observer)
            .run_all(transport, &self.plan.commands)
            .await;

        if let Err(e) = transport.disconnect().await {
            self.observer
                .warn(format!("failed to disconnect from cmd remote: {e}"));
        } else {
            self.observer.success("disconnected from remote.".to_string());
        }
        self.state = DeployState::CommandSessionClosed;

        Ok(Some(outcomes))
    }
}
