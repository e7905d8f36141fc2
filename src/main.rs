mod cli;

use crate::cli::Cli;
use anyhow::Context;
use chrono::Local;
use clap::Parser;
use clap::error::ErrorKind;
use std::sync::Arc;
use tracing::{debug, info};

use yunohost_installer::application::use_cases::{ProvisionHostUseCase, exit_code};
use yunohost_installer::config::InstallerSettings;
use yunohost_installer::debug::{DebugConfig, init_logging, log_error_details};
use yunohost_installer::infrastructure::system::{
    ConsolePrompter, FileRunLog, LinuxCommandExecutor, LinuxHostInspector, LinuxPlatformDetector,
};
use yunohost_installer::provisioning::{ProvisionError, RunConfig, RunLogSink};
use yunohost_installer::{BUILD_TIMESTAMP, VERSION};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    };
    let config = cli.run_config();

    if let Err(e) = init_logging(&DebugConfig::for_run(config.automatic)) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(&config) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            log_error_details(&*e, "startup");
            std::process::exit(1);
        }
    }
}

/// Runs the installation and returns the process exit code.
fn run(config: &RunConfig) -> anyhow::Result<i32> {
    let settings = InstallerSettings::from_env();
    let started_at = Local::now();
    let log = FileRunLog::create(settings.log_dir(), &settings.product, &started_at)
        .with_context(|| {
            format!(
                "Cannot create the installation log in {}",
                settings.log_dir().display()
            )
        })?;
    let log = Arc::new(log);
    let log_path = log
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    log.info(&format!(
        "install-yunohost {} (built {}) started at {}",
        VERSION,
        BUILD_TIMESTAMP,
        started_at.format("%Y-%m-%d %H:%M:%S")
    ));
    info!("Installation logs will be written to {}", log_path);

    // Dependency injection
    let platform_detector = Arc::new(LinuxPlatformDetector::new());
    let host_inspector = Arc::new(LinuxHostInspector::new());
    let executor = Arc::new(LinuxCommandExecutor::new(log.clone(), config));
    let prompter = Arc::new(ConsolePrompter::new());

    let use_case = ProvisionHostUseCase::new(
        platform_detector,
        host_inspector,
        executor,
        prompter,
        settings,
    );

    let result = use_case.execute(config, log.as_ref());
    match &result {
        Ok(outcome) => debug!("Run finished: {:?}", outcome),
        // Precondition, step and cancellation failures are already in the log
        Err(e) if matches!(e, ProvisionError::HostInspectionFailed(_)) => {
            log.fail(&e.to_string())
        }
        Err(e) => debug!("Run aborted: {}", e),
    }

    println!("Installation logs are available in {}", log_path);
    Ok(exit_code(&result))
}
