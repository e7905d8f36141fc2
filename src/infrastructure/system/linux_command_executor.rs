use crate::domain::provisioning::{
    CommandExecutor, CommandLine, CommandStatus, OutputMode, RunConfig, RunLogSink,
};
use nix::fcntl::OFlag;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use tracing::{debug, warn};

/// Variables handed to every child in automatic mode
const NONINTERACTIVE_ENV: &[(&str, &str)] = &[
    ("DEBIAN_FRONTEND", "noninteractive"),
    ("APT_LISTCHANGES_FRONTEND", "none"),
];

pub struct LinuxCommandExecutor {
    log: Arc<dyn RunLogSink>,
    automatic: bool,
}

impl LinuxCommandExecutor {
    pub fn new(log: Arc<dyn RunLogSink>, config: &RunConfig) -> Self {
        Self {
            log,
            automatic: config.automatic,
        }
    }

    fn command(&self, command: &CommandLine) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        if self.automatic {
            cmd.envs(NONINTERACTIVE_ENV.iter().copied());
        }
        cmd
    }

    /// Runs with stdout and stderr sharing one pipe, like `2>&1`, so the log
    /// keeps the order the child wrote in.
    fn run_captured(&self, command: &CommandLine, echo: bool) -> io::Result<ExitStatus> {
        let (reader, writer) = nix::unistd::pipe2(OFlag::O_CLOEXEC).map_err(io::Error::from)?;

        let stdin = if command.stdin.is_some() {
            Stdio::piped()
        } else if echo {
            Stdio::inherit()
        } else {
            Stdio::null()
        };

        // The Command owns our copies of the write end; dropping it lets the
        // reader see EOF once the child exits
        let mut child = {
            let mut cmd = self.command(command);
            cmd.stdin(stdin)
                .stdout(Stdio::from(writer.try_clone()?))
                .stderr(Stdio::from(writer));
            cmd.spawn()?
        };

        let feed = command.stdin.as_deref().zip(child.stdin.take());
        let mut reader = BufReader::new(File::from(reader));

        // stdin is fed from its own thread while the output is drained here
        std::thread::scope(|scope| {
            if let Some((input, mut pipe)) = feed {
                scope.spawn(move || {
                    if let Err(e) = pipe.write_all(input.as_bytes()) {
                        warn!("Failed to feed stdin of {}: {}", command.program, e);
                    }
                });
            }
            self.drain(&mut reader, &command.program, echo);
        });
        drop(reader);

        child.wait()
    }

    /// Copies the child's output into the run log until EOF. A read error
    /// stops the copy; the caller still waits for the child.
    fn drain(&self, reader: &mut impl BufRead, program: &str, echo: bool) {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    self.log.warn(&format!("Lost output of {program}: {e}"));
                    break;
                }
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            self.log.append_raw(line);
            if echo {
                println!("  | {line}");
            }
        }
    }

    fn run_passthrough(&self, command: &CommandLine) -> io::Result<ExitStatus> {
        self.command(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
    }
}

fn to_status(status: ExitStatus) -> CommandStatus {
    match (status.code(), status.signal()) {
        (Some(code), _) => CommandStatus::from_code(code),
        (None, Some(signal)) => CommandStatus::from_code(128 + signal),
        (None, None) => CommandStatus::from_code(1),
    }
}

impl CommandExecutor for LinuxCommandExecutor {
    fn run(&self, command: &CommandLine, mode: OutputMode) -> CommandStatus {
        debug!("Executing {:?} ({:?})", command, mode);
        self.log.info(&format!("+ {command}"));

        let result = match mode {
            OutputMode::Logged => self.run_captured(command, false),
            OutputMode::Streamed => self.run_captured(command, true),
            OutputMode::Passthrough => self.run_passthrough(command),
        };

        match result {
            Ok(status) => {
                let status = to_status(status);
                if !status.success() {
                    self.log.info(&format!(
                        "{} exited with status {}",
                        command.program, status.code
                    ));
                }
                status
            }
            Err(e) => {
                self.log.fail(&format!("Cannot run {}: {}", command.program, e));
                CommandStatus::NOT_FOUND
            }
        }
    }
}
