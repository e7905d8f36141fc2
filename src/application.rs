//! アプリケーション層
//!
//! プロビジョニング実行のユースケースと、共通のステップ実行機構

pub mod step_sequencer;
pub mod steps;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod test_support;
