use crate::cli::{print_call_log, RemoteDeployCli};
use crate::config::{locate_and_load, resolve, ConfigError};
use crate::deploy::{DeployReport, Deployer};
use crate::env::{DialoguerPrompt, NonInteractivePrompt, ProcessEnv, PromptProvider};
use crate::observer::{DeployObserver, TracingObserver};
use crate::transport::{
    MemoryCommandTransport, MemoryFileTransport, SshCommandTransport, SshFileTransport,
};
use crate::types::DeploymentPlan;
use anyhow::{Context, Result};
use tracing::info;

/// Load the manifest, apply flags and run the deployment.
pub async fn run_deploy(cli: &RemoteDeployCli) -> Result<DeployReport> {
    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let (manifest_path, mut manifest) = locate_and_load(cli.config.as_deref(), &cwd)
        .context("Failed to load deployment manifest")?;
    info!("Using manifest {}", manifest_path.display());

    cli.apply_overrides(&mut manifest);
    let plan = resolve(&manifest.options, cwd);

    let prompt: Box<dyn PromptProvider> = if cli.no_interactive {
        Box::new(NonInteractivePrompt)
    } else {
        Box::new(DialoguerPrompt)
    };
    let observer = TracingObserver;

    if cli.dry_run {
        return dry_run(plan, prompt.as_ref(), &observer).await;
    }

    let target = manifest.remote.ok_or(ConfigError::MissingRemote)?;
    info!("Deploying to {}:{}", target.destination(), plan.remote_dir);

    let has_commands = !plan.commands.is_empty();
    let mut file = SshFileTransport::new(target.clone());
    let mut commands = SshCommandTransport::new(target);
    let env = ProcessEnv;

    let mut deployer = Deployer::new(plan, &mut file, &env, prompt.as_ref(), &observer);
    if has_commands {
        deployer = deployer.with_command_transport(&mut commands);
    }
    let report = deployer.run().await.context("Deployment failed")?;
    Ok(report)
}

async fn dry_run(
    plan: DeploymentPlan,
    prompt: &dyn PromptProvider,
    observer: &dyn DeployObserver,
) -> Result<DeployReport> {
    info!("Dry run: no remote host will be contacted");
    let mut file = MemoryFileTransport::new();
    let mut commands = MemoryCommandTransport::new();
    let env = ProcessEnv;

    let report = Deployer::new(plan, &mut file, &env, prompt, observer)
        .with_command_transport(&mut commands)
        .run()
        .await
        .context("Dry run failed")?;

    print_call_log(file.calls(), &commands.calls());
    Ok(report)
}
