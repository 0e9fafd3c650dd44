use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::future::Future;
use std::time::Duration;

const BRAILLE_TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ";
const ASCII_TICKS: &str = "|/-\\ ";
const TICK_INTERVAL: Duration = Duration::from_millis(100);

pub struct ProgressState {
    style: ProgressStyle,
}

impl ProgressState {
    pub(crate) fn new(use_color: bool) -> Self {
        let template = if use_color {
            "{spinner:.cyan.bold} {msg}"
        } else {
            "{spinner} {msg}"
        };
        let ticks = if dumb_terminal() {
            ASCII_TICKS
        } else {
            BRAILLE_TICKS
        };
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(ticks);
        Self { style }
    }

    pub(crate) fn spinner(&self, message: String) -> ProgressBar {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(15))
            .with_style(self.style.clone())
            .with_message(message);
        bar.enable_steady_tick(TICK_INTERVAL);
        bar
    }
}

fn dumb_terminal() -> bool {
    std::env::var("TERM").is_ok_and(|term| term.eq_ignore_ascii_case("dumb"))
}

fn fetch_message(label: &str) -> String {
    format!("{} {}", "Fetching".bright_cyan().bold(), label.bold())
}

/// Shows a spinner while the chart download runs; `None` runs it silently.
pub async fn fetch_with_spinner<T>(
    progress: Option<&ProgressState>,
    label: &str,
    fut: impl Future<Output = Vec<T>>,
) -> Vec<T> {
    let Some(progress) = progress else {
        return fut.await;
    };
    let bar = progress.spinner(fetch_message(label));
    let entries = fut.await;
    finish_fetch(&bar, label, entries.len());
    entries
}

/// Stops the spinner with the entry count. Log events about the fetch are
/// emitted by the caller after this, so they never draw over the spinner line.
fn finish_fetch(bar: &ProgressBar, label: &str, count: usize) {
    let outcome = if count == 0 {
        "no entries".bright_red().bold()
    } else {
        format!("{count} entries").bright_green().bold()
    };
    bar.finish_with_message(format!("{} {outcome}", fetch_message(label)));
}
