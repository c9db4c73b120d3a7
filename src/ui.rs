//! Terminal helpers: the "thinking" spinner and terminal probing.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Width used when the terminal size cannot be read.
pub const FALLBACK_WIDTH: usize = 80;

/// A cancellable spinner drawn on stderr. Stopping clears its line; dropping
/// a running spinner stops it.
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    pub fn start(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_message(message.to_string());
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar: Some(bar) }
    }

    /// A spinner that never draws.
    #[must_use]
    pub fn hidden() -> Self {
        Self { bar: None }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.bar.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Column count of the controlling terminal, [`FALLBACK_WIDTH`] when unknown.
#[must_use]
pub fn terminal_width() -> usize {
    crossterm::terminal::size()
        .ok()
        .map(|(columns, _)| usize::from(columns))
        .filter(|columns| *columns > 0)
        .unwrap_or(FALLBACK_WIDTH)
}

#[must_use]
pub fn stdout_is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopping_is_idempotent() {
        let mut spinner = Spinner::start("Thinking...");
        assert!(spinner.is_running());
        spinner.stop();
        spinner.stop();
        assert!(!spinner.is_running());
        assert!(!Spinner::hidden().is_running());
    }

    #[test]
    fn width_is_never_zero() {
        assert!(terminal_width() > 0);
    }
}
