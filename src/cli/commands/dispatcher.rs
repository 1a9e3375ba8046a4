//! Command dispatching.
//!
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::cli::args::{Cli, Commands};
use crate::engine::ContainerEngine;
use crate::error::Result;
use crate::ui::UserInterface;

/// A CLI subcommand.
pub trait Command {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    pub success: bool,

    /// Process exit code (0 for success).
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Routes CLI subcommands to their implementations.
pub struct CommandDispatcher {
    project_root: PathBuf,
    interrupt: Arc<AtomicBool>,
    engine: Option<Box<dyn ContainerEngine>>,
}

impl CommandDispatcher {
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            interrupt: Arc::new(AtomicBool::new(false)),
            engine: None,
        }
    }

    /// Share the flag the interrupt handler sets.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// Use `engine` instead of the configured container CLI.
    pub fn with_engine(mut self, engine: Box<dyn ContainerEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let engine = self.engine.as_deref();
        match &cli.command {
            Commands::Build(args) => {
                let mut cmd = super::build::BuildCommand::new(&self.project_root, args.clone())
                    .with_interrupt(Arc::clone(&self.interrupt));
                if let Some(engine) = engine {
                    cmd = cmd.with_engine(engine);
                }
                cmd.execute(ui)
            }
            Commands::List(args) => {
                let mut cmd = super::list::ListCommand::new(&self.project_root, args.clone());
                if let Some(engine) = engine {
                    cmd = cmd.with_engine(engine);
                }
                cmd.execute(ui)
            }
            Commands::Config(args) => {
                let cmd = super::config::ConfigCommand::new(&self.project_root, args.clone());
                cmd.execute(ui)
            }
            Commands::Completions(args) => {
                let cmd = super::completions::CompletionsCommand::new(args.clone());
                cmd.execute(ui)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;
    use crate::ui::MockUI;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn command_result_codes() {
        assert_eq!(CommandResult::success().exit_code, 0);
        let failed = CommandResult::failure(2);
        assert!(!failed.success);
        assert_eq!(failed.exit_code, 2);
    }

    #[test]
    fn dispatches_build_to_injected_engine() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("repos/web");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Dockerfile"), "FROM alpine\n").unwrap();

        let dispatcher =
            CommandDispatcher::new(temp.path().to_path_buf()).with_engine(Box::new(MockEngine::new()));
        let cli = Cli::parse_from(["dockwright", "build"]);
        let mut ui = MockUI::new();

        let result = dispatcher.dispatch(&cli, &mut ui).unwrap();
        assert!(result.success);
        assert_eq!(ui.successes(), ["Built local/web:latest"]);
    }
}
