use clap::Parser;
use std::str::FromStr;
use yunohost_installer::provisioning::{Distribution, RunConfig};

#[derive(Parser, Debug)]
#[command(
    name = "install-yunohost",
    author = "YunoHost Installer Team",
    version,
    about = "Install YunoHost on top of a Debian system",
    long_about = "Upgrades the system, registers the YunoHost repository, installs the \
                  YunoHost packages and optionally runs the post-installation"
)]
pub struct Cli {
    /// Automatic mode: no questions asked, package output goes to the log only
    #[arg(short = 'a')]
    pub automatic: bool,

    /// Package channel to install from
    #[arg(
        short = 'd',
        value_name = "stable|testing|unstable",
        default_value = "stable",
        value_parser = parse_distribution
    )]
    pub distribution: Distribution,

    /// Ignore the conflicting package checks
    #[arg(short = 'f')]
    pub force: bool,

    /// Build a distributable image instead of provisioning this host
    #[arg(short = 'i', hide = true)]
    pub image: bool,
}

fn parse_distribution(value: &str) -> Result<Distribution, String> {
    Distribution::from_str(value).map_err(|e| e.to_string())
}

impl Cli {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            automatic: self.automatic,
            distribution: self.distribution,
            image_build: self.image,
            force: self.force,
        }
    }
}
