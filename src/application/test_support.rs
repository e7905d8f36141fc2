//! Fakes of the provisioning ports for use-case tests.

use crate::domain::provisioning::{
    CommandExecutor, CommandLine, CommandStatus, HostFacts, HostInspector, LogLevel, OutputMode,
    Platform, PlatformDetector, Prompter, ProvisionError, RunConfig, RunLogSink,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

/// Records every command and answers with scripted statuses.
///
/// A rule matches when the rendered command starts with its pattern; its codes
/// are consumed in order and the last one repeats.
#[derive(Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<(CommandLine, OutputMode)>>,
    rules: Mutex<Vec<(String, VecDeque<i32>)>>,
}

impl RecordingExecutor {
    pub fn failing_on(patterns: &[&str], code: i32) -> Self {
        let executor = Self::default();
        for pattern in patterns {
            executor.script(pattern, &[code]);
        }
        executor
    }

    pub fn script(&self, pattern: &str, codes: &[i32]) {
        self.rules
            .lock()
            .unwrap()
            .push((pattern.to_string(), codes.iter().copied().collect()));
    }

    pub fn calls(&self) -> Vec<(CommandLine, OutputMode)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|(c, _)| c.program).collect()
    }

    pub fn rendered(&self) -> Vec<String> {
        self.calls().into_iter().map(|(c, _)| c.to_string()).collect()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.rendered().iter().any(|c| c.starts_with(prefix))
    }
}

impl CommandExecutor for RecordingExecutor {
    fn run(&self, command: &CommandLine, mode: OutputMode) -> CommandStatus {
        self.calls.lock().unwrap().push((command.clone(), mode));
        let rendered = command.to_string();
        let mut rules = self.rules.lock().unwrap();
        for (pattern, codes) in rules.iter_mut() {
            if rendered.starts_with(pattern.as_str()) {
                let code = if codes.len() > 1 {
                    codes.pop_front().unwrap_or(0)
                } else {
                    codes.front().copied().unwrap_or(0)
                };
                return CommandStatus::from_code(code);
            }
        }
        CommandStatus::from_code(0)
    }
}

/// Answers prompts from a fixed script; any extra prompt is a test failure.
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Fails the test on the first prompt.
    pub fn silent() -> Self {
        Self::new(&[])
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, question: &str, _default_yes: bool) -> bool {
        self.asked.lock().unwrap().push(question.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected prompt: {question}"))
    }
}

#[derive(Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    pub fn count_tag(&self, tag: &str) -> usize {
        let prefix = format!("[{tag}]");
        self.lines().iter().filter(|l| l.starts_with(&prefix)).count()
    }
}

impl RunLogSink for MemoryLog {
    fn record(&self, level: LogLevel, message: &str) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("[{}] {}", level.tag(), message));
    }

    fn append_raw(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn path(&self) -> Option<&Path> {
        None
    }
}

pub struct StaticHost(pub HostFacts);

impl StaticHost {
    /// A bookworm host where every precondition holds.
    pub fn healthy() -> Self {
        Self(HostFacts {
            os_id: "debian".to_string(),
            codename: Some("bookworm".to_string()),
            debian_major: Some(12),
            effective_uid: 0,
            systemd_present: true,
            ..HostFacts::default()
        })
    }
}

impl HostInspector for StaticHost {
    fn gather_facts(&self, watched_packages: &[String]) -> Result<HostFacts, ProvisionError> {
        let mut facts = self.0.clone();
        facts
            .installed_packages
            .retain(|p| watched_packages.iter().any(|w| w == p));
        Ok(facts)
    }
}

pub struct StaticPlatform {
    pub raspbian: bool,
}

impl PlatformDetector for StaticPlatform {
    fn detect(&self, config: &RunConfig) -> Platform {
        Platform {
            raspbian: self.raspbian,
            image_build: config.image_build,
        }
    }
}
