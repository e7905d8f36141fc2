//! プロビジョニングステップの順次実行
//!
//! ステップは必ず定義順に実行する。`Abort` のステップが失敗すると
//! そのメッセージで実行を中止し、適用済みの変更は戻さない。
//! `Tolerate` のステップは警告を残すだけ。

use crate::config::InstallerSettings;
use crate::domain::provisioning::{
    CommandExecutor, CommandLine, CommandStatus, FailurePolicy, Platform, Prompter,
    ProvisionError, RunConfig, RunLogSink, StepResult,
};
use crate::measure_time;
use tracing::debug;

/// ステップが利用できるもの一式。ステップ自身は状態を持たない
pub struct StepContext<'a> {
    pub config: &'a RunConfig,
    pub platform: &'a Platform,
    pub settings: &'a InstallerSettings,
    pub executor: &'a dyn CommandExecutor,
    pub log: &'a dyn RunLogSink,
}

impl StepContext<'_> {
    /// 実行設定に合った出力モードでコマンドを実行
    pub fn run(&self, command: CommandLine) -> CommandStatus {
        self.executor.run(&command, self.config.output_mode())
    }

    /// 順に実行し、最初に 0 以外で終了したところで止める
    pub fn run_all(&self, commands: impl IntoIterator<Item = CommandLine>) -> StepResult {
        for command in commands {
            let rendered = command.to_string();
            let status = self.run(command);
            if !status.success() {
                return StepResult::failure(status.code, format!("'{rendered}' failed"));
            }
        }
        StepResult::Success
    }
}

pub type StepAction = fn(&StepContext<'_>) -> StepResult;

/// 名前付きのプロビジョニング作業単位
#[derive(Clone)]
pub struct Step {
    pub name: &'static str,
    pub fatal_message: &'static str,
    pub policy: FailurePolicy,
    /// この種類の最初のステップの前にオペレーターの確認が必要
    pub overwrites_configuration: bool,
    pub action: StepAction,
}

impl Step {
    pub fn new(name: &'static str, fatal_message: &'static str, action: StepAction) -> Self {
        Self {
            name,
            fatal_message,
            policy: FailurePolicy::Abort,
            overwrites_configuration: false,
            action,
        }
    }

    pub fn tolerate_failure(mut self) -> Self {
        self.policy = FailurePolicy::Tolerate;
        self
    }

    pub fn overwriting_configuration(mut self) -> Self {
        self.overwrites_configuration = true;
        self
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("overwrites_configuration", &self.overwrites_configuration)
            .finish()
    }
}

/// 設定ファイルを上書きする前の確認
pub struct ConfirmationGate<'a> {
    pub prompter: &'a dyn Prompter,
    pub question: String,
}

pub struct StepSequencer {
    steps: Vec<Step>,
}

impl StepSequencer {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name).collect()
    }

    /// すべてのステップを実行する。自動モードでは `gate` は `None`
    pub fn run(
        &self,
        ctx: &StepContext<'_>,
        gate: Option<&ConfirmationGate<'_>>,
    ) -> Result<(), ProvisionError> {
        let mut confirmed = false;

        for (index, step) in self.steps.iter().enumerate() {
            if step.overwrites_configuration && !confirmed {
                if let Some(gate) = gate {
                    if !gate.prompter.confirm(&gate.question, true) {
                        ctx.log.fail("Installation cancelled at your request");
                        return Err(ProvisionError::UserCancelled);
                    }
                    ctx.log.info("Configuration overwrite confirmed by the operator");
                }
                confirmed = true;
            }

            ctx.log.info(&format!(
                "[{}/{}] Running step '{}'",
                index + 1,
                self.steps.len(),
                step.name
            ));

            let result = measure_time!(step.name, { (step.action)(ctx) });

            match (result, step.policy) {
                (StepResult::Success, _) => {
                    ctx.log.ok(&format!("Step '{}' completed", step.name));
                }
                (StepResult::Failure(failure), FailurePolicy::Tolerate) => {
                    debug!(step = step.name, code = failure.code, "Tolerated failure");
                    ctx.log.warn(&format!(
                        "{} ({}), continuing anyway",
                        step.fatal_message, failure.detail
                    ));
                }
                (StepResult::Failure(failure), FailurePolicy::Abort) => {
                    debug!(step = step.name, code = failure.code, "Aborting run");
                    ctx.log.fail(&format!("{} ({})", step.fatal_message, failure.detail));
                    return Err(ProvisionError::StepFailed {
                        step: step.name.to_string(),
                        message: step.fatal_message.to_string(),
                        code: failure.code,
                    });
                }
            }
        }

        Ok(())
    }
}
