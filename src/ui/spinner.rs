//! Progress spinners.

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::engine::ProgressEvent;

use super::theme::DockwrightTheme;
use super::SpinnerHandle;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";
const MAX_LINE_WIDTH: usize = 72;

/// A spinner for long-running operations.
pub struct ProgressSpinner {
    bar: ProgressBar,
}

impl ProgressSpinner {
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_chars(TICK_CHARS)
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));

        Self { bar }
    }

    /// A spinner that draws nothing.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    fn finish_with(&mut self, line: String) {
        let style = ProgressStyle::default_spinner()
            .template("{msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        self.bar.set_style(style);
        self.bar.finish_with_message(line);
    }
}

impl SpinnerHandle for ProgressSpinner {
    fn set_message(&mut self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    fn finish_success(&mut self, msg: &str) {
        let line = DockwrightTheme::new().format_success(msg);
        self.finish_with(line);
    }

    fn finish_error(&mut self, msg: &str) {
        let line = DockwrightTheme::new().format_error(msg);
        self.finish_with(line);
    }

    fn progress_bar(&self) -> Option<ProgressBar> {
        Some(self.bar.clone())
    }
}

/// Build a progress sink that shows the last `max_lines` engine events
/// under `base_message` on `bar`.
///
/// Events without displayable text are dropped and long lines are
/// shortened.
pub fn progress_callback(
    bar: ProgressBar,
    base_message: String,
    max_lines: usize,
) -> impl Fn(&ProgressEvent) {
    let buffer: Mutex<VecDeque<String>> = Mutex::new(VecDeque::new());
    let theme = DockwrightTheme::new();

    move |event: &ProgressEvent| {
        let Some(text) = event.display() else {
            return;
        };
        let text = text.trim_end();
        if text.is_empty() {
            return;
        }

        let shown = if text.chars().count() > MAX_LINE_WIDTH {
            let head: String = text.chars().take(MAX_LINE_WIDTH - 3).collect();
            format!("{}...", head)
        } else {
            text.to_string()
        };

        let Ok(mut buf) = buffer.lock() else {
            return;
        };
        buf.push_back(shown);
        while buf.len() > max_lines {
            buf.pop_front();
        }

        let mut msg = base_message.clone();
        for line in buf.iter() {
            msg.push_str("\n  ");
            msg.push_str(&theme.dim.apply_to(format!("» {}", line)).to_string());
        }
        bar.set_message(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_lifecycle() {
        let mut spinner = ProgressSpinner::hidden();
        spinner.set_message("Building");
        spinner.finish_success("Built");
    }

    #[test]
    fn finish_error_does_not_panic() {
        let mut spinner = ProgressSpinner::hidden();
        spinner.finish_error("Failed");
    }

    #[test]
    fn callback_keeps_last_lines() {
        let bar = ProgressBar::hidden();
        let callback = progress_callback(bar.clone(), "Building demo".to_string(), 2);

        callback(&ProgressEvent::Stream("Step 1/3 : FROM alpine\n".to_string()));
        callback(&ProgressEvent::Stream("Step 2/3 : COPY copy /\n".to_string()));
        assert!(bar.message().contains("Step 1/3"));

        callback(&ProgressEvent::Stream("Step 3/3 : CMD sh\n".to_string()));
        let msg = bar.message();
        assert!(msg.starts_with("Building demo"));
        assert!(!msg.contains("Step 1/3"));
        assert!(msg.contains("Step 2/3"));
        assert!(msg.contains("Step 3/3"));
    }

    #[test]
    fn callback_skips_blank_lines() {
        let bar = ProgressBar::hidden();
        let callback = progress_callback(bar.clone(), "Pushing".to_string(), 3);

        callback(&ProgressEvent::Plain("   ".to_string()));
        callback(&ProgressEvent::Plain("layer pushed".to_string()));
        assert_eq!(bar.message().matches('\n').count(), 1);
    }

    #[test]
    fn callback_truncates_long_lines() {
        let bar = ProgressBar::hidden();
        let callback = progress_callback(bar.clone(), "Building".to_string(), 3);

        callback(&ProgressEvent::Plain("x".repeat(100)));
        let msg = bar.message();
        assert!(msg.contains("..."));
        assert!(!msg.contains(&"x".repeat(100)));
    }
}
