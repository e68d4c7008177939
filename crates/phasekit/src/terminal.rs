//! Spinner and styled status lines on stderr.

use std::borrow::Cow;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner shown while a trace is replayed.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(spinner) = ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.cyan} {msg}")
        {
            bar.set_style(spinner);
        }
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    pub fn finish_with_success(&self, message: &str) {
        self.bar.finish_and_clear();
        success(message);
    }

    pub fn finish_with_failure(&self, message: &str) {
        self.bar.finish_and_clear();
        error(message);
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

pub fn info(message: &str) {
    eprintln!("{} {}", style("→").cyan(), message);
}

pub fn success(message: &str) {
    eprintln!("{} {}", style("✓").green().bold(), message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}
