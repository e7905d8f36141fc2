//! コンソールログ
//!
//! オペレーターが端末で見る `tracing` サブスクライバーを設定する。
//! インストールログファイルは別管理 (`FileRunLog` を参照)

use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

/// コンソールログ設定
#[derive(Debug, Clone)]
pub struct DebugConfig {
    pub log_level: Level,
    /// メッセージにモジュールパスを表示するか
    pub with_target: bool,
    pub use_ansi: bool,
    pub show_timestamps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self::interactive()
    }
}

impl DebugConfig {
    /// 端末で操作する場合の設定 (色付き、簡潔)
    pub fn interactive() -> Self {
        Self {
            log_level: Level::INFO,
            with_target: false,
            use_ansi: true,
            show_timestamps: false,
        }
    }

    /// 無人実行用の設定 (CI や cloud-init の出力向け)
    pub fn automatic() -> Self {
        Self {
            log_level: Level::INFO,
            with_target: false,
            use_ansi: false,
            show_timestamps: true,
        }
    }

    pub fn for_run(automatic: bool) -> Self {
        if automatic {
            Self::automatic()
        } else {
            Self::interactive()
        }
    }
}

/// グローバルなコンソールサブスクライバーを登録する。
/// `RUST_LOG` が設定されていればそちらを優先する
pub fn init_logging(config: &DebugConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("yunohost_installer={}", config.log_level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.with_target)
        .with_ansi(config.use_ansi);

    if config.show_timestamps {
        builder.try_init()?;
    } else {
        builder.without_time().try_init()?;
    }

    debug!("Console logging initialised: {:?}", config);
    Ok(())
}

/// パフォーマンス測定マクロ
#[macro_export]
macro_rules! measure_time {
    ($name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        let duration = start.elapsed();
        tracing::debug!(
            operation = $name,
            duration_ms = duration.as_millis(),
            "Operation finished"
        );
        result
    }};
}

/// エラーの詳細情報をログ出力
pub fn log_error_details(error: &dyn std::error::Error, context: &str) {
    tracing::error!(context = context, error = %error, "Error occurred");

    let mut source = error.source();
    let mut level = 1;
    while let Some(err) = source {
        tracing::error!(context = context, level = level, source_error = %err, "Caused by");
        source = err.source();
        level += 1;
    }
}
