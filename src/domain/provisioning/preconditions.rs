//! ホストの事前条件
//!
//! 各ルールは [`HostFacts`] のスナップショットに対する純粋な判定。
//! 最初の変更ステップより前にすべて評価し、force モードで無視されない
//! 失敗が一つでもあれば実行を中止する。

use super::entities::{HostFacts, Platform};
use crate::config::ExpectedRelease;

type Check = Box<dyn Fn(&HostFacts) -> Result<(), String> + Send + Sync>;

pub struct Precondition {
    pub description: String,
    /// force モードでは失敗しても致命的扱いにしない
    pub forceable: bool,
    check: Check,
}

impl Precondition {
    pub fn new<F>(description: impl Into<String>, forceable: bool, check: F) -> Self
    where
        F: Fn(&HostFacts) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            forceable,
            check: Box::new(check),
        }
    }

    pub fn check(&self, facts: &HostFacts) -> Result<(), String> {
        (self.check)(facts)
    }
}

impl std::fmt::Debug for Precondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Precondition")
            .field("description", &self.description)
            .field("forceable", &self.forceable)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed(String),
    /// 失敗したが force モードで無視された
    Bypassed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreconditionOutcome {
    pub description: String,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreconditionReport {
    pub outcomes: Vec<PreconditionOutcome>,
}

impl PreconditionReport {
    pub fn failures(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.verdict {
                Verdict::Failed(reason) => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn bypassed(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.verdict {
                Verdict::Bypassed(reason) => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_satisfied(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| !matches!(o.verdict, Verdict::Failed(_)))
    }
}

/// バージョン番号か codename のどちらかが一致すればよい。
/// Raspberry Pi OS などの派生版は `debian_version` を持たないことがある。
pub fn debian_release(expected: &ExpectedRelease) -> Precondition {
    let expected = expected.clone();
    Precondition::new(
        format!("Debian {} ({})", expected.major, expected.codename),
        false,
        move |facts| {
            let codename_matches = facts.codename.as_deref() == Some(expected.codename.as_str());
            match facts.debian_major {
                Some(major) if major == expected.major => Ok(()),
                None if codename_matches => Ok(()),
                Some(major) => Err(format!(
                    "This installer only supports Debian {} ({}), found Debian {}",
                    expected.major, expected.codename, major
                )),
                None => {
                    let found = match (&facts.codename, facts.os_id.as_str()) {
                        (Some(codename), "") => codename.clone(),
                        (Some(codename), os_id) => format!("{os_id} {codename}"),
                        (None, "") => "unknown".to_string(),
                        (None, os_id) => os_id.to_string(),
                    };
                    Err(format!(
                        "This installer only supports Debian {} ({}), found '{}'",
                        expected.major, expected.codename, found
                    ))
                }
            }
        },
    )
}

pub fn root_privileges() -> Precondition {
    Precondition::new("Running as root", false, |facts| {
        if facts.effective_uid == 0 {
            Ok(())
        } else {
            Err("This script must be run as root".to_string())
        }
    })
}

pub fn init_system() -> Precondition {
    Precondition::new("systemd is the init system", false, |facts| {
        if facts.systemd_present {
            Ok(())
        } else {
            Err("systemd must be installed and running as the init system".to_string())
        }
    })
}

pub fn no_legacy_session(user: &str) -> Precondition {
    let user = user.to_string();
    Precondition::new(format!("No session open for user '{user}'"), false, move |facts| {
        if facts.has_session(&user) {
            Err(format!(
                "The user '{user}' must not be logged in, since it is deleted during installation. \
                 Log in as root directly"
            ))
        } else {
            Ok(())
        }
    })
}

pub fn package_not_installed(package: &str) -> Precondition {
    let package = package.to_string();
    Precondition::new(format!("Package '{package}' is not installed"), true, move |facts| {
        if facts.is_installed(&package) {
            Err(format!(
                "{package} is installed and conflicts with the installation. \
                 Remove it first, or use -f to ignore this check"
            ))
        } else {
            Ok(())
        }
    })
}

/// このホストに適用するルール (評価順)
pub fn host_preconditions(
    expected: &ExpectedRelease,
    platform: &Platform,
    legacy_user: &str,
    conflicting_packages: &[String],
) -> Vec<Precondition> {
    let mut rules = vec![debian_release(expected), root_privileges(), init_system()];
    if platform.raspbian {
        rules.push(no_legacy_session(legacy_user));
    }
    rules.extend(conflicting_packages.iter().map(|p| package_not_installed(p)));
    rules
}

/// すべてのルールを評価する。最初の失敗で止めず、失敗をまとめて報告する
pub fn evaluate(rules: &[Precondition], facts: &HostFacts, force: bool) -> PreconditionReport {
    let outcomes = rules
        .iter()
        .map(|rule| {
            let verdict = match rule.check(facts) {
                Ok(()) => Verdict::Passed,
                Err(reason) if force && rule.forceable => Verdict::Bypassed(reason),
                Err(reason) => Verdict::Failed(reason),
            };
            PreconditionOutcome {
                description: rule.description.clone(),
                verdict,
            }
        })
        .collect();
    PreconditionReport { outcomes }
}
