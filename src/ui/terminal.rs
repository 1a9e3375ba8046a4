//! Terminal UI.

use console::Term;
use std::io::Write;

use super::{DockwrightTheme, OutputMode, ProgressSpinner, SpinnerHandle, UserInterface};

/// [`UserInterface`] writing to stdout, with errors on stderr.
pub struct TerminalUI {
    out: Term,
    err: Term,
    theme: DockwrightTheme,
    mode: OutputMode,
}

impl TerminalUI {
    pub fn new(mode: OutputMode, color: bool) -> Self {
        let theme = if color {
            DockwrightTheme::new()
        } else {
            DockwrightTheme::plain()
        };

        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            theme,
            mode,
        }
    }

    pub fn theme(&self) -> &DockwrightTheme {
        &self.theme
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.out, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.out, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.err, "{}", self.theme.format_warning(msg)).ok();
        }
    }

    fn error(&mut self, msg: &str) {
        writeln!(self.err, "{}", self.theme.format_error(msg)).ok();
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.out, "\n{}", self.theme.format_header(title)).ok();
        }
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_spinners() && self.out.is_term() {
            Box::new(ProgressSpinner::new(message))
        } else {
            Box::new(ProgressSpinner::hidden())
        }
    }

    fn is_interactive(&self) -> bool {
        self.out.is_term()
    }
}
