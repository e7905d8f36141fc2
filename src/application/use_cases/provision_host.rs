use super::run_post_install::RunPostInstallUseCase;
use crate::application::step_sequencer::{ConfirmationGate, StepContext, StepSequencer};
use crate::application::steps::provisioning_steps;
use crate::config::InstallerSettings;
use crate::domain::provisioning::preconditions::{self, Verdict};
use crate::domain::provisioning::{
    CommandExecutor, HostInspector, PlatformDetector, Prompter, ProvisionError, RunConfig,
    RunLogSink, RunOutcome,
};
use std::sync::Arc;
use tracing::{debug, info};

/// 実行結果をプロセスの終了コードに変換する
///
/// 致命的なエラーはすべて 1。post-install の再試行を諦めた場合だけ、
/// ウィザードの最後の終了コードがそのまま返る。
pub fn exit_code(result: &Result<RunOutcome, ProvisionError>) -> i32 {
    match result {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => e.exit_code(),
    }
}

/// Full provisioning run: preconditions, the step sequence, then post-install.
pub struct ProvisionHostUseCase {
    platform_detector: Arc<dyn PlatformDetector>,
    host_inspector: Arc<dyn HostInspector>,
    executor: Arc<dyn CommandExecutor>,
    prompter: Arc<dyn Prompter>,
    settings: InstallerSettings,
}

impl ProvisionHostUseCase {
    pub fn new(
        platform_detector: Arc<dyn PlatformDetector>,
        host_inspector: Arc<dyn HostInspector>,
        executor: Arc<dyn CommandExecutor>,
        prompter: Arc<dyn Prompter>,
        settings: InstallerSettings,
    ) -> Self {
        Self {
            platform_detector,
            host_inspector,
            executor,
            prompter,
            settings,
        }
    }

    pub fn execute(
        &self,
        config: &RunConfig,
        log: &dyn RunLogSink,
    ) -> Result<RunOutcome, ProvisionError> {
        info!("Starting {} installation...", self.settings.product);
        log.info(&format!(
            "Run configuration: {}",
            serde_json::to_string(config).unwrap_or_else(|_| format!("{config:?}"))
        ));

        let platform = self.platform_detector.detect(config);
        debug!("Detected platform: {:?}", platform);
        log.info(&format!(
            "Platform: raspbian={}, image_build={}",
            platform.raspbian, platform.image_build
        ));

        // Nothing below this point may run unless the host qualifies
        let facts = self
            .host_inspector
            .gather_facts(&self.settings.conflicting_packages)?;
        debug!("Host facts: {:?}", facts);

        let rules = preconditions::host_preconditions(
            &self.settings.expected_release,
            &platform,
            &self.settings.legacy_user,
            &self.settings.conflicting_packages,
        );
        let report = preconditions::evaluate(&rules, &facts, config.force);
        for outcome in &report.outcomes {
            match &outcome.verdict {
                Verdict::Passed => log.info(&format!("Check passed: {}", outcome.description)),
                Verdict::Bypassed(reason) => {
                    log.warn(&format!("{reason} (ignored because of -f)"))
                }
                Verdict::Failed(reason) => log.fail(reason),
            }
        }
        if !report.is_satisfied() {
            return Err(ProvisionError::PreconditionFailed {
                failures: report.failures(),
            });
        }

        let sequencer = StepSequencer::new(provisioning_steps(&platform));
        debug!("Step plan: {:?}", sequencer.step_names());

        let ctx = StepContext {
            config,
            platform: &platform,
            settings: &self.settings,
            executor: self.executor.as_ref(),
            log,
        };
        let gate = ConfirmationGate {
            prompter: self.prompter.as_ref(),
            question: format!(
                "The installation will overwrite the configuration of: {}. \
                 Are you sure you want to proceed?",
                self.settings.overwritten_services.join(", ")
            ),
        };
        sequencer.run(&ctx, (!config.automatic).then_some(&gate))?;

        log.info(&format!("{} packages installed", self.settings.product));

        let post_install = RunPostInstallUseCase::new(self.executor.clone(), self.prompter.clone());
        let outcome = post_install.execute(config, &self.settings, log);

        if outcome.exit_code() == 0 {
            log.ok("Installation completed successfully");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{
        MemoryLog, RecordingExecutor, ScriptedPrompter, StaticHost, StaticPlatform,
    };
    use crate::domain::provisioning::{Distribution, OutputMode};
    use tracing_test::traced_test;

    struct Harness {
        _dir: tempfile::TempDir,
        settings: InstallerSettings,
        executor: Arc<RecordingExecutor>,
        prompter: Arc<ScriptedPrompter>,
        log: MemoryLog,
    }

    impl Harness {
        fn new(answers: &[bool]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let settings = InstallerSettings::for_root(dir.path());
            // keep the workarounds step from calling ssh-keygen
            let keys = settings.host_path("/etc/ssh/ssh_host_ed25519_key");
            std::fs::create_dir_all(keys.parent().unwrap()).unwrap();
            std::fs::write(keys, b"key").unwrap();
            Self {
                _dir: dir,
                settings,
                executor: Arc::new(RecordingExecutor::default()),
                prompter: Arc::new(ScriptedPrompter::new(answers)),
                log: MemoryLog::default(),
            }
        }

        fn run(
            &self,
            host: StaticHost,
            raspbian: bool,
            config: &RunConfig,
        ) -> Result<RunOutcome, ProvisionError> {
            let use_case = ProvisionHostUseCase::new(
                Arc::new(StaticPlatform { raspbian }),
                Arc::new(host),
                self.executor.clone(),
                self.prompter.clone(),
                self.settings.clone(),
            );
            use_case.execute(config, &self.log)
        }
    }

    fn automatic() -> RunConfig {
        RunConfig {
            automatic: true,
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_missing_init_system_aborts_before_any_command() {
        let harness = Harness::new(&[]);
        let mut host = StaticHost::healthy();
        host.0.systemd_present = false;
        let config = RunConfig {
            automatic: true,
            distribution: Distribution::Testing,
            ..RunConfig::default()
        };

        let err = harness.run(host, false, &config).unwrap_err();

        assert!(matches!(err, ProvisionError::PreconditionFailed { .. }));
        assert!(harness.executor.calls().is_empty());
        assert!(harness.log.contains("[FAIL] systemd must be installed"));
        assert!(!harness
            .settings
            .host_path(&harness.settings.sources_list_path)
            .exists());
    }

    #[test]
    fn test_conflicting_package_blocks_unless_forced() {
        let mut host = StaticHost::healthy();
        host.0.installed_packages.insert("apache2".to_string());

        let harness = Harness::new(&[]);
        let err = harness.run(host, false, &automatic()).unwrap_err();
        assert!(err.to_string().contains("apache2"));
        assert!(harness.executor.calls().is_empty());

        let mut host = StaticHost::healthy();
        host.0.installed_packages.insert("apache2".to_string());
        let harness = Harness::new(&[]);
        let forced = RunConfig {
            force: true,
            ..automatic()
        };
        assert!(harness.run(host, false, &forced).is_ok());
        assert!(harness.log.contains("(ignored because of -f)"));
    }

    #[test]
    fn test_automatic_run_never_prompts_and_logs_only() {
        let harness = Harness::new(&[]);
        let outcome = harness
            .run(StaticHost::healthy(), false, &automatic())
            .unwrap();

        assert_eq!(outcome, RunOutcome::PostInstallDeclined);
        assert!(harness.prompter.asked().is_empty());
        assert!(harness
            .executor
            .calls()
            .iter()
            .all(|(_, mode)| *mode == OutputMode::Logged));
    }

    #[test]
    fn test_step_failure_stops_the_run() {
        let harness = Harness::new(&[]);
        harness.executor.script("debconf-set-selections", &[1]);

        let err = harness
            .run(StaticHost::healthy(), false, &automatic())
            .unwrap_err();

        match err {
            ProvisionError::StepFailed { step, .. } => assert_eq!(step, "preseed_debconf"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!harness.executor.ran("wget"));
        assert!(!harness.executor.ran("systemctl"));
    }

    #[test]
    fn test_service_restart_failure_is_not_fatal() {
        let harness = Harness::new(&[]);
        harness.executor.script("systemctl restart slapd", &[1]);

        let outcome = harness
            .run(StaticHost::healthy(), false, &automatic())
            .unwrap();

        assert_eq!(outcome.exit_code(), 0);
        assert!(harness.log.contains("[WARN] Error caught during services restart"));
        assert!(harness.log.contains("Installation completed successfully"));
    }

    #[test]
    fn test_same_inputs_give_same_commands() {
        let first = Harness::new(&[]);
        first.run(StaticHost::healthy(), true, &automatic()).unwrap();
        let second = Harness::new(&[]);
        second.run(StaticHost::healthy(), true, &automatic()).unwrap();

        let strip = |h: &Harness| -> Vec<String> {
            let root = h.settings.root.to_string_lossy().to_string();
            h.executor
                .rendered()
                .into_iter()
                .map(|c| c.replace(&root, "<root>"))
                .collect()
        };
        assert_eq!(strip(&first), strip(&second));
        assert!(first.executor.ran("deluser"));
    }

    #[test]
    #[traced_test]
    fn test_interactive_happy_path() {
        // confirm overwrite, proceed with post-install
        let harness = Harness::new(&[true, true]);
        let outcome = harness
            .run(StaticHost::healthy(), false, &RunConfig::default())
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(harness.prompter.asked().len(), 2);
        assert!(harness.prompter.asked()[0].contains("OpenLDAP"));

        // one OK per step plus the final line
        let steps = provisioning_steps(&Default::default()).len();
        assert_eq!(harness.log.count_tag(" OK "), steps + 1);
        let extra_ok: Vec<String> = harness
            .log
            .lines()
            .into_iter()
            .filter(|l| l.starts_with("[ OK ]") && !l.starts_with("[ OK ] Step '"))
            .collect();
        assert_eq!(extra_ok, vec!["[ OK ] Installation completed successfully"]);
        assert!(harness
            .log
            .lines()
            .last()
            .unwrap()
            .contains("Installation completed successfully"));
        assert_eq!(exit_code(&Ok(outcome)), 0);
        assert!(logs_contain("Operation finished"));
    }

    #[test]
    fn test_declined_confirmation_cancels_run() {
        let harness = Harness::new(&[false]);
        let err = harness
            .run(StaticHost::healthy(), false, &RunConfig::default())
            .unwrap_err();

        assert!(matches!(err, ProvisionError::UserCancelled));
        assert!(!harness.executor.ran("debconf-set-selections"));
        assert!(harness.executor.ran("apt-get --assume-yes -o Dpkg::Options::=--force-confdef -o Dpkg::Options::=--force-confold dist-upgrade"));
    }

    #[test]
    fn test_exit_codes_of_fatal_and_declined_runs() {
        let mut host = StaticHost::healthy();
        host.0.effective_uid = 1000;
        let harness = Harness::new(&[]);
        let result = harness.run(host, false, &automatic());
        assert!(matches!(result, Err(ProvisionError::PreconditionFailed { .. })));
        assert_eq!(exit_code(&result), 1);

        let harness = Harness::new(&[]);
        harness.executor.script("apt-get --assume-yes -o Dpkg::Options::=--force-confdef -o Dpkg::Options::=--force-confold dist-upgrade", &[100]);
        let result = harness.run(StaticHost::healthy(), false, &automatic());
        assert!(matches!(result, Err(ProvisionError::StepFailed { code: 100, .. })));
        assert_eq!(exit_code(&result), 1);

        let harness = Harness::new(&[false]);
        let result = harness.run(StaticHost::healthy(), false, &RunConfig::default());
        assert!(matches!(result, Err(ProvisionError::UserCancelled)));
        assert_eq!(exit_code(&result), 1);

        // overwrite confirmed, post-install postponed
        let harness = Harness::new(&[true, false]);
        let result = harness.run(StaticHost::healthy(), false, &RunConfig::default());
        assert_eq!(result.as_ref().ok(), Some(&RunOutcome::PostInstallDeclined));
        assert_eq!(exit_code(&result), 0);

        let harness = Harness::new(&[]);
        assert_eq!(exit_code(&harness.run(StaticHost::healthy(), false, &automatic())), 0);
    }

    #[test]
    fn test_abandoned_post_install_exits_with_wizard_status() {
        // overwrite confirmed, post-install accepted, retry declined
        let harness = Harness::new(&[true, true, false]);
        harness.executor.script("yunohost tools postinstall", &[2]);
        let result = harness.run(StaticHost::healthy(), false, &RunConfig::default());
        assert_eq!(exit_code(&result), 2);
        assert!(!harness.log.contains("Installation completed successfully"));
    }
}
