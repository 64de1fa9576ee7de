use crate::deploy::DeployReport;
use crate::transport::{CommandCall, TransportCall};

/// Print a human-readable summary of a finished run.
pub fn print_report(report: &DeployReport) {
    println!("📦 Deployment {}", report.deployment_id);
    if report.env_only {
        println!("  • Filesystem sync skipped (env only)");
    } else {
        let sync = &report.sync;
        println!("  • Folders created: {}", sync.created.len());
        println!("  • Folders cleared: {}", sync.cleared.len());
        println!(
            "  • Paths deleted: {} file(s), {} dir(s)",
            sync.deleted_files.len(),
            sync.deleted_dirs.len()
        );
        println!("  • Files uploaded: {}", sync.uploaded.len());
    }
    println!(
        "  • {} written with {} field(s)",
        report.env_file,
        report.env_fields_written.len()
    );

    match &report.commands {
        Some(outcomes) => {
            let failed = report.failed_commands();
            println!(
                "  • Commands run: {} ({} with errors)",
                outcomes.len(),
                failed.len()
            );
            for outcome in failed {
                let status = outcome
                    .exit_code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "none".to_string());
                println!("    ⚠️  {} (exit status {})", outcome.command, status);
            }
        }
        None => println!("  • Commands skipped"),
    }
    println!("⏱️  Finished in {}ms", report.duration.as_millis());
}

/// Print the remote calls recorded during a dry run.
pub fn print_call_log(file_calls: &[TransportCall], command_calls: &[CommandCall]) {
    println!("🔍 Dry run: file remote");
    for call in file_calls {
        let line = match call {
            TransportCall::SetPathPrefix(prefix) => format!("set_path_prefix {prefix}"),
            TransportCall::Connect => "connect".to_string(),
            TransportCall::Disconnect => "disconnect".to_string(),
            TransportCall::Exists(path) => format!("exists {path}"),
            TransportCall::CreateDir(path) => format!("create_dir {path}"),
            TransportCall::Delete(path) => format!("delete {path}"),
            TransportCall::DeleteDir(path) => format!("delete_dir {path}"),
            TransportCall::UploadFile { local, remote } => {
                format!("upload_file {} -> {remote}", local.display())
            }
            TransportCall::CreateFile { path, contents } => {
                format!("create_file {path} ({} bytes)", contents.len())
            }
        };
        println!("  {line}");
    }

    if command_calls.is_empty() {
        return;
    }
    println!("🔍 Dry run: command remote");
    for call in command_calls {
        match call {
            CommandCall::Connect => println!("  connect"),
            CommandCall::Disconnect => println!("  disconnect"),
            CommandCall::Spawn(command) => println!("  spawn {command}"),
            CommandCall::Completed(_) => {}
        }
    }
}
