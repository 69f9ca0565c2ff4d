//! User-facing interaction seam (blocking alerts and confirmations).
//!
//! Controllers never talk to a terminal or window directly; the front end
//! injects an implementation at construction time.

use std::sync::Mutex;

/// Blocking alert / confirmation surface.
pub trait Interaction: Send + Sync {
    /// Show a message the user must acknowledge.
    fn alert(&self, message: &str);

    /// Ask a yes/no question. `true` means proceed.
    fn confirm(&self, message: &str) -> bool;
}

/// Non-interactive implementation: logs alerts, answers every confirmation
/// with a fixed value and remembers what was shown.
#[derive(Debug, Default)]
pub struct Headless {
    answer: bool,
    shown: Mutex<Vec<String>>,
}

impl Headless {
    /// Answer `yes` to every confirmation.
    pub fn approving() -> Self {
        Self {
            answer: true,
            shown: Mutex::new(Vec::new()),
        }
    }

    /// Answer `no` to every confirmation.
    pub fn declining() -> Self {
        Self::default()
    }

    /// Alerts and prompts shown so far, oldest first.
    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, message: &str) {
        if let Ok(mut shown) = self.shown.lock() {
            shown.push(message.to_string());
        }
    }
}

impl Interaction for Headless {
    fn alert(&self, message: &str) {
        tracing::warn!(%message, "alert");
        self.record(message);
    }

    fn confirm(&self, message: &str) -> bool {
        tracing::debug!(%message, answer = self.answer, "confirm");
        self.record(message);
        self.answer
    }
}
