use crate::config::InstallerSettings;
use crate::domain::provisioning::{
    CommandExecutor, CommandLine, OutputMode, Prompter, RunConfig, RunLogSink, RunOutcome,
};
use std::sync::Arc;
use tracing::debug;

/// Hands over to the product's post-install wizard once packages are in place.
///
/// The wizard is opaque: only its exit status matters. A failed run may be
/// retried as many times as the operator wants.
pub struct RunPostInstallUseCase {
    executor: Arc<dyn CommandExecutor>,
    prompter: Arc<dyn Prompter>,
}

impl RunPostInstallUseCase {
    pub fn new(executor: Arc<dyn CommandExecutor>, prompter: Arc<dyn Prompter>) -> Self {
        Self { executor, prompter }
    }

    pub fn execute(
        &self,
        config: &RunConfig,
        settings: &InstallerSettings,
        log: &dyn RunLogSink,
    ) -> RunOutcome {
        let command = CommandLine::new(settings.post_install_program.clone())
            .args(settings.post_install_args.iter().cloned());

        let marker = settings.host_path(&settings.installed_marker);
        if marker.exists() {
            debug!("Installed marker found at {}", marker.display());
            log.info("Post-installation already performed on this host, skipping it");
            return RunOutcome::PostInstallSkipped;
        }

        if config.automatic {
            log.info(&format!(
                "Automatic mode: run '{command}' to perform the post-installation"
            ));
            return RunOutcome::PostInstallDeclined;
        }

        if !self
            .prompter
            .confirm("Proceed with the post-installation now?", true)
        {
            log.info(&format!(
                "Post-installation postponed, run '{command}' when you are ready"
            ));
            return RunOutcome::PostInstallDeclined;
        }

        loop {
            log.info(&format!("Launching '{command}'"));
            let status = self.executor.run(&command, OutputMode::Passthrough);
            if status.success() {
                log.info("Post-installation completed");
                return RunOutcome::Completed;
            }

            log.warn(&format!("Post-installation exited with status {}", status.code));

            if !self.prompter.confirm("Post-installation failed. Retry?", true) {
                log.fail(&format!(
                    "Post-installation abandoned, run '{command}' to try again"
                ));
                return RunOutcome::PostInstallFailed {
                    status: status.code,
                };
            }
        }
    }
}
