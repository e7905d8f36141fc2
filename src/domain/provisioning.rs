//! プロビジョニングドメイン
//!
//! 実行設定、ホストの特性、何かを変更する前に評価する事前条件、そして
//! ステップがホストに触れるためのポート (コマンド実行、確認、実行ログ) を扱う

pub mod entities;
pub mod preconditions;
pub mod repositories;

pub use entities::{
    CommandLine, CommandStatus, DebconfSelection, Distribution, FailurePolicy, HostFacts,
    LogLevel, OutputMode, Platform, RunConfig, RunOutcome, StepFailure, StepResult,
};
pub use preconditions::{Precondition, PreconditionReport, Verdict};
pub use repositories::{
    CommandExecutor, HostInspector, PlatformDetector, Prompter, ProvisionError, RunLogSink,
};
