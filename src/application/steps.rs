//! プロビジョニングステップ一覧

use super::step_sequencer::{Step, StepContext};
use crate::domain::provisioning::{CommandLine, Platform, StepResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// このプラットフォームで実行するステップ (実行順)
pub fn provisioning_steps(platform: &Platform) -> Vec<Step> {
    let mut steps = vec![
        Step::new(
            "refresh_package_sources",
            "Unable to refresh the package index",
            refresh_package_sources,
        ),
        Step::new("upgrade_system", "Unable to update the system", upgrade_system),
        Step::new(
            "install_script_dependencies",
            "Unable to install dependencies to install script",
            install_script_dependencies,
        ),
        Step::new(
            "preseed_debconf",
            "Unable to insert new values into debconf database",
            preseed_debconf,
        )
        .overwriting_configuration(),
        Step::new(
            "register_repository",
            "Setting up deb package sources failed",
            register_repository,
        )
        .overwriting_configuration(),
        Step::new(
            "apply_packaging_workarounds",
            "Unable to apply packaging workarounds",
            apply_packaging_workarounds,
        )
        .overwriting_configuration(),
        Step::new(
            "install_packages",
            "Installation of packages failed",
            install_packages,
        )
        .overwriting_configuration(),
        // slapd sometimes refuses to restart right after installation; the
        // instance is still usable and the operator can restart it later
        Step::new(
            "restart_services",
            "Error caught during services restart",
            restart_services,
        )
        .tolerate_failure(),
    ];

    if platform.raspbian {
        steps.push(Step::new(
            "raspbian_cleanup",
            "Unable to clean up Raspbian specific settings",
            raspbian_cleanup,
        ));
    }
    if platform.image_build {
        steps.push(Step::new(
            "sanitize_image",
            "Unable to clean the image",
            sanitize_image,
        ));
    }

    steps
}

fn apt_get(args: &[&str]) -> CommandLine {
    CommandLine::new("apt-get")
        .args([
            "--assume-yes",
            "-o",
            "Dpkg::Options::=--force-confdef",
            "-o",
            "Dpkg::Options::=--force-confold",
        ])
        .args(args.iter().copied())
}

fn io_failure(context: &str, path: &Path, err: io::Error) -> StepResult {
    StepResult::failure(1, format!("{context} {}: {err}", path.display()))
}

fn refresh_package_sources(ctx: &StepContext<'_>) -> StepResult {
    ctx.run_all([apt_get(&["update"])])
}

fn upgrade_system(ctx: &StepContext<'_>) -> StepResult {
    ctx.run_all([apt_get(&["dist-upgrade"])])
}

fn install_script_dependencies(ctx: &StepContext<'_>) -> StepResult {
    let install = apt_get(&["install"]).args(ctx.settings.script_dependencies.iter().cloned());
    ctx.run_all([install])
}

fn preseed_debconf(ctx: &StepContext<'_>) -> StepResult {
    let selections: String = ctx
        .settings
        .debconf_seeds
        .iter()
        .map(|seed| format!("{seed}\n"))
        .collect();
    debug!("Pre-seeding {} debconf values", ctx.settings.debconf_seeds.len());
    ctx.run_all([CommandLine::new("debconf-set-selections").stdin(selections)])
}

fn register_repository(ctx: &StepContext<'_>) -> StepResult {
    let settings = ctx.settings;

    let keyring = settings.host_path(&settings.keyring_path);
    if let Err(e) = ensure_parent(&keyring) {
        return io_failure("Cannot create directory for", &keyring, e);
    }
    let fetch_key = CommandLine::new("wget")
        .args(["--quiet", "--output-document"])
        .arg(keyring.to_string_lossy())
        .arg(settings.repository_key_url.clone());
    if let StepResult::Failure(f) = ctx.run_all([fetch_key]) {
        return StepResult::Failure(f);
    }

    let sources = settings.host_path(&settings.sources_list_path);
    let line = settings.sources_line(ctx.config.distribution.components());
    if let Err(e) = ensure_parent(&sources).and_then(|_| fs::write(&sources, format!("{line}\n"))) {
        return io_failure("Cannot write", &sources, e);
    }
    ctx.log.info(&format!("Wrote '{line}' to {}", sources.display()));

    ctx.run_all([apt_get(&["update"])])
}

fn apply_packaging_workarounds(ctx: &StepContext<'_>) -> StepResult {
    // avahi-daemon's postinst fails when its system user is missing (containers)
    let lookup = ctx.run(CommandLine::new("getent").args(["passwd", "avahi"]));
    if !lookup.success() {
        info!("Creating missing avahi system user");
        let create = CommandLine::new("adduser").args([
            "--system",
            "--group",
            "--no-create-home",
            "--disabled-login",
            "avahi",
        ]);
        if let StepResult::Failure(f) = ctx.run_all([create]) {
            return StepResult::Failure(f);
        }
    }

    // openssh-server's postinst aborts when no host key exists
    match ssh_host_keys(ctx) {
        Ok(keys) if keys.is_empty() => ctx.run_all([CommandLine::new("ssh-keygen").arg("-A")]),
        Ok(_) => StepResult::Success,
        Err(e) => StepResult::failure(1, format!("Cannot list SSH host keys: {e}")),
    }
}

fn install_packages(ctx: &StepContext<'_>) -> StepResult {
    let install = apt_get(&["install"]).args(ctx.settings.packages.iter().cloned());
    ctx.run_all([install])
}

fn restart_services(ctx: &StepContext<'_>) -> StepResult {
    ctx.run_all(
        ctx.settings
            .restart_services
            .iter()
            .map(|service| CommandLine::new("systemctl").args(["restart", service.as_str()])),
    )
}

fn raspbian_cleanup(ctx: &StepContext<'_>) -> StepResult {
    let settings = ctx.settings;
    let user = settings.legacy_user.as_str();

    if ctx.run(CommandLine::new("getent").args(["passwd", user])).success() {
        ctx.log.info(&format!("Removing default user '{user}'"));
        let remove = CommandLine::new("deluser").args(["--remove-all-files", user]);
        if let StepResult::Failure(f) = ctx.run_all([remove]) {
            return StepResult::Failure(f);
        }
    }

    // Every Raspbian image ships the same host keys; replace them exactly once
    let marker = settings.host_path(&settings.ssh_keys_marker);
    if marker.exists() {
        debug!("SSH host keys already regenerated ({})", marker.display());
        return StepResult::Success;
    }
    if let Err(e) = remove_ssh_host_keys(ctx) {
        return StepResult::failure(1, format!("Cannot remove SSH host keys: {e}"));
    }
    if let StepResult::Failure(f) = ctx.run_all([CommandLine::new("ssh-keygen").arg("-A")]) {
        return StepResult::Failure(f);
    }
    match ensure_parent(&marker).and_then(|_| fs::write(&marker, b"")) {
        Ok(()) => StepResult::Success,
        Err(e) => io_failure("Cannot write marker", &marker, e),
    }
}

fn sanitize_image(ctx: &StepContext<'_>) -> StepResult {
    if let Err(e) = remove_ssh_host_keys(ctx) {
        return StepResult::failure(1, format!("Cannot remove SSH host keys: {e}"));
    }

    let marker = ctx.settings.host_path(&ctx.settings.ssh_keys_marker);
    if marker.exists() {
        if let Err(e) = fs::remove_file(&marker) {
            return io_failure("Cannot remove marker", &marker, e);
        }
    }

    ctx.run_all([apt_get(&["clean"])])
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

fn ssh_host_keys(ctx: &StepContext<'_>) -> io::Result<Vec<PathBuf>> {
    let dir = ctx.settings.host_path("/etc/ssh");
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut keys = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        let is_key = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("ssh_host_"));
        if is_key {
            keys.push(path);
        }
    }
    keys.sort();
    Ok(keys)
}

fn remove_ssh_host_keys(ctx: &StepContext<'_>) -> io::Result<()> {
    for key in ssh_host_keys(ctx)? {
        fs::remove_file(&key)?;
        ctx.log.info(&format!("Removed {}", key.display()));
    }
    Ok(())
}
