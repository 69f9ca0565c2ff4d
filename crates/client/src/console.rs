//! Terminal implementation of the alert/confirm seam.

use std::io::{BufRead, Write};

use larder_core::Interaction;

/// Alerts go to stderr; confirmations read a y/N answer from stdin unless
/// `assume_yes` is set.
#[derive(Debug, Default)]
pub struct ConsoleInteraction {
    assume_yes: bool,
}

impl ConsoleInteraction {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

impl Interaction for ConsoleInteraction {
    fn alert(&self, message: &str) {
        eprintln!("! {message}");
    }

    fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        eprint!("{message} [y/N] ");
        let _ = std::io::stderr().flush();
        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(e) => {
                tracing::warn!("Could not read confirmation: {}", e);
                false
            }
        }
    }
}
