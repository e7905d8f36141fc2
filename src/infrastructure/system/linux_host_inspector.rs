use crate::domain::provisioning::{HostFacts, HostInspector, ProvisionError};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

pub struct LinuxHostInspector {
    root: PathBuf,
}

impl Default for LinuxHostInspector {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }
}

impl LinuxHostInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn logged_in_users(&self) -> Vec<String> {
        match Command::new("who").output() {
            Ok(output) if output.status.success() => {
                parse_who(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                warn!("who exited with {}", output.status);
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to run who: {}", e);
                Vec::new()
            }
        }
    }

    fn installed_packages(&self, watched: &[String]) -> BTreeSet<String> {
        watched
            .iter()
            .filter(|package| {
                let output = Command::new("dpkg-query")
                    .args(["--show", "--showformat=${Status}", package.as_str()])
                    .output();
                match output {
                    Ok(output) => {
                        let status = String::from_utf8_lossy(&output.stdout);
                        debug!("dpkg status of {}: {:?}", package, status);
                        output.status.success() && is_installed_status(&status)
                    }
                    Err(e) => {
                        debug!("dpkg-query unavailable: {}", e);
                        false
                    }
                }
            })
            .cloned()
            .collect()
    }
}

impl HostInspector for LinuxHostInspector {
    fn gather_facts(&self, watched_packages: &[String]) -> Result<HostFacts, ProvisionError> {
        if !self.root.is_dir() {
            return Err(ProvisionError::HostInspectionFailed(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }

        let os_release = read_os_release(&self.path("/etc/os-release"));
        let debian_major = fs::read_to_string(self.path("/etc/debian_version"))
            .ok()
            .and_then(|content| parse_debian_major(&content));

        let facts = HostFacts {
            os_id: os_release.get("ID").cloned().unwrap_or_default(),
            codename: os_release.get("VERSION_CODENAME").cloned(),
            debian_major,
            effective_uid: unsafe { libc::geteuid() },
            systemd_present: self.path("/run/systemd/system").is_dir(),
            logged_in_users: self.logged_in_users(),
            installed_packages: self.installed_packages(watched_packages),
        };
        debug!("Gathered host facts: {:?}", facts);
        Ok(facts)
    }
}

/// Key/value pairs of an os-release file; unreadable files yield nothing.
pub(crate) fn read_os_release(path: &Path) -> HashMap<String, String> {
    match fs::read_to_string(path) {
        Ok(content) => parse_os_release(&content),
        Err(e) => {
            debug!("Cannot read {}: {}", path.display(), e);
            HashMap::new()
        }
    }
}

pub(crate) fn parse_os_release(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// `12.5` → 12. Testing and unstable hosts report a codename (`trixie/sid`)
/// and have no major version.
fn parse_debian_major(content: &str) -> Option<u32> {
    content.trim().split('.').next()?.parse().ok()
}

fn parse_who(output: &str) -> Vec<String> {
    let mut users: Vec<String> = output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect();
    users.sort();
    users.dedup();
    users
}

fn is_installed_status(status: &str) -> bool {
    status.trim() == "install ok installed"
}
