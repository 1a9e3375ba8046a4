//! Command-line interface for dockwright.
//!
//! - [`args`] - argument definitions using clap derive macros
//! - [`commands`] - command implementations

pub mod args;
pub mod commands;

pub use args::{BuildArgs, Cli, Commands, CompletionsArgs, ConfigArgs, ListArgs};
pub use commands::{Command, CommandDispatcher, CommandResult};
