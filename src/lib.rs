//! # YunoHost installer
//!
//! Debian ベースのシステム上に YunoHost サーバーを無人で構築するインストーラー。
//! OS の更新、パッケージリポジトリの登録、debconf の事前設定、パッケージの
//! インストールを行い、最後に post-install ウィザードへ引き継ぐ。
//!
//! このクレートは以下のレイヤーで構成されている:
//!
//! - **Domain Layer**: 実行設定、事前条件、ステップが使うポート
//! - **Application Layer**: ステップ一覧、シーケンサー、ユースケース
//! - **Infrastructure Layer**: ポートの Linux 実装

pub mod application;
pub mod config;
pub mod debug;
pub mod domain;
pub mod infrastructure;

pub use domain::*;

/// インストールログのヘッダーに記録するバージョン
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const BUILD_TIMESTAMP: &str = env!("BUILD_TIMESTAMP");
