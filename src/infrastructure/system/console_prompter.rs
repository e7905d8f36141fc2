use crate::domain::provisioning::Prompter;
use std::io::{self, BufRead, Write};
use tracing::warn;

/// Asks on the controlling terminal and blocks until the operator answers.
#[derive(Default)]
pub struct ConsolePrompter;

impl ConsolePrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for ConsolePrompter {
    fn confirm(&self, question: &str, default_yes: bool) -> bool {
        let stdin = io::stdin();
        let stdout = io::stdout();
        ask(&mut stdin.lock(), &mut stdout.lock(), question, default_yes)
    }
}

/// Keeps asking until the answer is yes, no or empty (the default).
/// End of input counts as "no".
fn ask(input: &mut impl BufRead, output: &mut impl Write, question: &str, default_yes: bool) -> bool {
    let hint = if default_yes { "[Y/n]" } else { "[y/N]" };
    loop {
        let _ = write!(output, "{question} {hint} ");
        let _ = output.flush();

        let mut answer = String::new();
        match input.read_line(&mut answer) {
            Ok(0) => {
                let _ = writeln!(output);
                return false;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to read answer: {}", e);
                return false;
            }
        }

        match answer.trim().to_lowercase().as_str() {
            "" => return default_yes,
            "y" | "yes" => return true,
            "n" | "no" => return false,
            _ => {
                let _ = writeln!(output, "Please answer yes or no.");
            }
        }
    }
}
