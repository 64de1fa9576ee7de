use anyhow::Result;
use clap::Parser;
use remote_deploy::cli::{print_report, run_deploy, RemoteDeployCli};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = RemoteDeployCli::parse();

    // Logs go to stderr; stdout carries command output and the summary
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    info!("Starting remote-deploy v{}", env!("CARGO_PKG_VERSION"));

    match run_deploy(&cli).await {
        Ok(report) => {
            let failed = report.failed_commands().len();
            if failed > 0 {
                warn!("{} post-deploy command(s) reported errors", failed);
            }
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            Err(e)
        }
    }
}
