//! Terminal output for dockwright commands.
//!
//! Commands talk to a [`UserInterface`] so the same code drives a real
//! terminal ([`TerminalUI`]) and tests ([`MockUI`]).

pub mod mock;
pub mod output;
pub mod spinner;
pub mod terminal;
pub mod theme;

pub use mock::MockUI;
pub use output::OutputMode;
pub use spinner::{progress_callback, ProgressSpinner};
pub use terminal::TerminalUI;
pub use theme::{should_use_colors, DockwrightTheme};

/// Handle to a running spinner.
pub trait SpinnerHandle {
    /// Update the spinner message.
    fn set_message(&mut self, msg: &str);

    /// Finish with a success mark.
    fn finish_success(&mut self, msg: &str);

    /// Finish with an error mark.
    fn finish_error(&mut self, msg: &str);

    /// Underlying progress bar, when the spinner is drawn.
    fn progress_bar(&self) -> Option<indicatif::ProgressBar> {
        None
    }
}

/// User-facing output channel.
pub trait UserInterface {
    fn output_mode(&self) -> OutputMode;

    /// Plain status line.
    fn message(&mut self, msg: &str);

    fn success(&mut self, msg: &str);

    fn warning(&mut self, msg: &str);

    /// Errors are shown in every output mode.
    fn error(&mut self, msg: &str);

    fn show_header(&mut self, title: &str);

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle>;

    /// Whether stdout is a terminal.
    fn is_interactive(&self) -> bool;
}

/// Create the terminal UI for `mode`.
pub fn create_ui(mode: OutputMode, color: bool) -> Box<dyn UserInterface> {
    Box::new(TerminalUI::new(mode, color && should_use_colors()))
}
