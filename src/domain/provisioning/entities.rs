use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// パッケージリポジトリのリリースチャンネル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    #[default]
    Stable,
    Testing,
    Unstable,
}

impl Distribution {
    /// このチャンネルで有効にするコンポーネント。より安定したチャンネルも含む
    pub fn components(&self) -> &'static [&'static str] {
        match self {
            Distribution::Stable => &["stable"],
            Distribution::Testing => &["stable", "testing"],
            Distribution::Unstable => &["stable", "testing", "unstable"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Distribution::Stable => "stable",
            Distribution::Testing => "testing",
            Distribution::Unstable => "unstable",
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDistribution(pub String);

impl fmt::Display for UnknownDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown distribution '{}' (expected stable, testing or unstable)",
            self.0
        )
    }
}

impl std::error::Error for UnknownDistribution {}

impl FromStr for Distribution {
    type Err = UnknownDistribution;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(Distribution::Stable),
            "testing" => Ok(Distribution::Testing),
            "unstable" => Ok(Distribution::Unstable),
            other => Err(UnknownDistribution(other.to_string())),
        }
    }
}

/// 実行設定。コマンドラインから一度だけ生成し、以後は読み取り専用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// 非対話モード: 確認なし、パッケージの出力はログのみ
    pub automatic: bool,
    pub distribution: Distribution,
    /// 稼働中のホストではなく配布用イメージを作成する
    pub image_build: bool,
    /// 競合パッケージのチェックを省略
    pub force: bool,
}

impl RunConfig {
    pub fn output_mode(&self) -> OutputMode {
        if self.automatic {
            OutputMode::Logged
        } else {
            OutputMode::Streamed
        }
    }
}

/// ホストの特性。シーケンサー開始前に一度だけ判定する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Platform {
    pub raspbian: bool,
    pub image_build: bool,
}

/// 事前条件の評価対象となるホスト状態のスナップショット
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostFacts {
    pub os_id: String,
    pub codename: Option<String>,
    pub debian_major: Option<u32>,
    pub effective_uid: u32,
    pub systemd_present: bool,
    pub logged_in_users: Vec<String>,
    /// 問い合わせたパッケージのうちインストール済みのもの
    pub installed_packages: BTreeSet<String>,
}

impl HostFacts {
    pub fn is_installed(&self, package: &str) -> bool {
        self.installed_packages.contains(package)
    }

    pub fn has_session(&self, user: &str) -> bool {
        self.logged_in_users.iter().any(|u| u == user)
    }
}

/// 子プロセスの出力の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// 標準出力とエラー出力をまとめて実行ログにのみ追記
    Logged,
    /// 実行ログに追記し、端末にも一行ずつ表示
    Streamed,
    /// 子プロセスが端末をそのまま使う。ログには起動と終了コードのみ
    Passthrough,
}

/// 外部コマンド (プログラム、引数、標準入力に渡す内容)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// 外部コマンドの終了コード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    pub code: i32,
}

impl CommandStatus {
    /// 起動できなかったプログラム (シェルの慣例)
    pub const NOT_FOUND: CommandStatus = CommandStatus { code: 127 };

    pub fn from_code(code: i32) -> Self {
        Self { code }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub code: i32,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Success,
    Failure(StepFailure),
}

impl StepResult {
    pub fn failure(code: i32, detail: impl Into<String>) -> Self {
        StepResult::Failure(StepFailure {
            code,
            detail: detail.into(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepResult::Success)
    }
}

/// ステップ失敗時のシーケンサーの動作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    Abort,
    /// 警告を記録して続行する
    Tolerate,
}

/// 実行ログの行の重要度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Fail,
    Ok,
}

impl LogLevel {
    pub fn tag(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Fail => "FAIL",
            LogLevel::Ok => " OK ",
        }
    }
}

/// debconf の事前設定一件 (`debconf-set-selections` の行形式)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebconfSelection {
    pub package: String,
    pub question: String,
    pub kind: String,
    pub value: String,
}

impl DebconfSelection {
    pub fn new(package: &str, question: &str, kind: &str, value: &str) -> Self {
        Self {
            package: package.to_string(),
            question: question.to_string(),
            kind: kind.to_string(),
            value: value.to_string(),
        }
    }
}

impl fmt::Display for DebconfSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.package, self.question, self.kind)?;
        if !self.value.is_empty() {
            write!(f, " {}", self.value)?;
        }
        Ok(())
    }
}

/// 致命的なエラーなしで終わった実行の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    PostInstallSkipped,
    PostInstallDeclined,
    PostInstallFailed { status: i32 },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::PostInstallFailed { status } => *status,
            _ => 0,
        }
    }
}
