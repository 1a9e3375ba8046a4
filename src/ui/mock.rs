//! Mock UI for tests.
//!
//! `MockUI` records every interaction so command tests can assert on
//! what would have been printed.
//!
//! # Example
//!
//! ```
//! use dockwright::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.message("Building local/demo:latest");
//! ui.success("Built local/demo:latest");
//!
//! assert_eq!(ui.messages(), ["Building local/demo:latest"]);
//! assert_eq!(ui.successes(), ["Built local/demo:latest"]);
//! ```

use std::sync::{Arc, Mutex};

use super::{OutputMode, SpinnerHandle, UserInterface};

/// Recording [`UserInterface`].
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    headers: Vec<String>,
    spinners: Arc<Mutex<Vec<SpinnerRecord>>>,
}

/// What happened to one spinner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinnerRecord {
    pub message: String,
    /// `Some(true)` on success, `Some(false)` on error.
    pub finished: Option<bool>,
    pub final_message: Option<String>,
}

impl MockUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn spinners(&self) -> Vec<SpinnerRecord> {
        self.spinners.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Everything printed, in no particular grouping.
    pub fn all_output(&self) -> String {
        self.headers
            .iter()
            .chain(&self.messages)
            .chain(&self.successes)
            .chain(&self.warnings)
            .chain(&self.errors)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        let index = match self.spinners.lock() {
            Ok(mut spinners) => {
                spinners.push(SpinnerRecord {
                    message: message.to_string(),
                    finished: None,
                    final_message: None,
                });
                spinners.len() - 1
            }
            Err(_) => 0,
        };
        Box::new(MockSpinner {
            records: Arc::clone(&self.spinners),
            index,
        })
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

struct MockSpinner {
    records: Arc<Mutex<Vec<SpinnerRecord>>>,
    index: usize,
}

impl MockSpinner {
    fn update(&self, f: impl FnOnce(&mut SpinnerRecord)) {
        if let Ok(mut records) = self.records.lock() {
            if let Some(record) = records.get_mut(self.index) {
                f(record);
            }
        }
    }
}

impl SpinnerHandle for MockSpinner {
    fn set_message(&mut self, msg: &str) {
        self.update(|r| r.message = msg.to_string());
    }

    fn finish_success(&mut self, msg: &str) {
        self.update(|r| {
            r.finished = Some(true);
            r.final_message = Some(msg.to_string());
        });
    }

    fn finish_error(&mut self, msg: &str) {
        self.update(|r| {
            r.finished = Some(false);
            r.final_message = Some(msg.to_string());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_messages_by_kind() {
        let mut ui = MockUI::new();
        ui.show_header("local/demo:latest");
        ui.warning("no credentials");
        ui.error("build failed");

        assert_eq!(ui.headers(), ["local/demo:latest"]);
        assert_eq!(ui.warnings(), ["no credentials"]);
        assert_eq!(ui.errors(), ["build failed"]);
        assert!(ui.all_output().contains("build failed"));
    }

    #[test]
    fn records_spinner_outcome() {
        let mut ui = MockUI::new();
        let mut ok = ui.start_spinner("Building a");
        let mut bad = ui.start_spinner("Building b");
        ok.finish_success("Built a");
        bad.finish_error("Failed b");

        let spinners = ui.spinners();
        assert_eq!(spinners[0].finished, Some(true));
        assert_eq!(spinners[0].final_message.as_deref(), Some("Built a"));
        assert_eq!(spinners[1].finished, Some(false));
    }

    #[test]
    fn keeps_requested_mode() {
        let ui = MockUI::with_mode(OutputMode::Quiet);
        assert_eq!(ui.output_mode(), OutputMode::Quiet);
        assert!(!ui.is_interactive());
    }
}
