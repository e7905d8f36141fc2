pub mod provision_host;
pub mod run_post_install;

pub use provision_host::{ProvisionHostUseCase, exit_code};
pub use run_post_install::RunPostInstallUseCase;
