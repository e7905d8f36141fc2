//! Linux implementations of the provisioning ports
//!
//! Process execution, host inspection, platform detection, operator prompts
//! and the installation log file.

mod console_prompter;
mod file_run_log;
mod linux_command_executor;
mod linux_host_inspector;
mod linux_platform_detector;

pub use console_prompter::ConsolePrompter;
pub use file_run_log::FileRunLog;
pub use linux_command_executor::LinuxCommandExecutor;
pub use linux_host_inspector::LinuxHostInspector;
pub use linux_platform_detector::LinuxPlatformDetector;
