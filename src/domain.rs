//! ドメイン層
//!
//! プロビジョニングのモデルと、アプリケーション層が利用するポート

pub mod provisioning;
