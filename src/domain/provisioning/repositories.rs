use super::entities::{
    CommandLine, CommandStatus, HostFacts, LogLevel, OutputMode, Platform, RunConfig,
};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Host does not meet the installation requirements: {}", .failures.join("; "))]
    PreconditionFailed { failures: Vec<String> },

    #[error("{message} (step '{step}' exited with status {code})")]
    StepFailed {
        step: String,
        message: String,
        code: i32,
    },

    #[error("Installation cancelled at your request")]
    UserCancelled,

    #[error("Failed to inspect host: {0}")]
    HostInspectionFailed(String),
}

impl ProvisionError {
    /// 致命的なエラーは種類を問わず終了コード 1
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// ホスト上で外部プロセスを実行する
///
/// 0 以外の終了コードは戻り値で返すだけで、致命的かどうかは呼び出し側が判断する
pub trait CommandExecutor: Send + Sync {
    fn run(&self, command: &CommandLine, mode: OutputMode) -> CommandStatus;
}

/// 事前条件に必要なホスト状態を読み取る
pub trait HostInspector: Send + Sync {
    /// `watched_packages` はインストール状態を確認するパッケージ
    fn gather_facts(&self, watched_packages: &[String]) -> Result<HostFacts, ProvisionError>;
}

pub trait PlatformDetector: Send + Sync {
    fn detect(&self, config: &RunConfig) -> Platform;
}

/// オペレーターへの yes/no 確認 (応答まで待つ)
pub trait Prompter: Send + Sync {
    fn confirm(&self, question: &str, default_yes: bool) -> bool;
}

/// インストールログファイルへの追記専用の出力先
pub trait RunLogSink: Send + Sync {
    fn record(&self, level: LogLevel, message: &str);

    /// 子プロセスの出力をそのまま書き込む
    fn append_raw(&self, line: &str);

    fn path(&self) -> Option<&Path>;

    fn info(&self, message: &str) {
        self.record(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.record(LogLevel::Warn, message);
    }

    fn fail(&self, message: &str) {
        self.record(LogLevel::Fail, message);
    }

    fn ok(&self, message: &str) {
        self.record(LogLevel::Ok, message);
    }
}
