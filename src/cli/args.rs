//! CLI argument definitions.
//!
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::metadata::{Map, Value};

/// Dockwright - build container images from a tree of templates.
#[derive(Debug, Parser)]
#[command(name = "dockwright")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Template workspace root (overrides current directory)
    #[arg(short = 'C', long, global = true, value_name = "DIR")]
    pub project: Option<PathBuf>,

    /// Echo engine output while building
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build images for repositories
    Build(BuildArgs),

    /// List repositories and the tags they expand to
    List(ListArgs),

    /// Show the resolved metadata of a repository
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `build` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct BuildArgs {
    /// Repositories to build (`name`, `name:tag`, `user/name:tag`).
    /// Builds every repository when omitted.
    #[arg(value_name = "REPO")]
    pub repos: Vec<String>,

    /// Push images after building
    #[arg(long)]
    pub push: bool,

    /// Keep a copy of each build context under the cache directory
    #[arg(long)]
    pub cache: bool,

    /// Keep rootfs helper images after the run
    #[arg(long)]
    pub keep_rootfs: bool,

    /// Container engine program
    #[arg(long, value_name = "PROG")]
    pub engine: Option<String>,
}

impl BuildArgs {
    /// Config keys set by the flags, as an override mapping.
    pub fn overrides(&self) -> Value {
        let mut map = Map::new();
        if self.push {
            map.insert("push".to_string(), Value::Bool(true));
        }
        if self.cache {
            map.insert("cache".to_string(), Value::Bool(true));
        }
        if self.keep_rootfs {
            map.insert("keep_rootfs".to_string(), Value::Bool(true));
        }
        if let Some(engine) = &self.engine {
            map.insert("engine".to_string(), Value::from(engine.as_str()));
        }
        Value::Mapping(map)
    }
}

/// Arguments for the `list` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ListArgs {
    /// Repositories to list. Lists every repository when omitted.
    #[arg(value_name = "REPO")]
    pub repos: Vec<String>,
}

/// Arguments for the `config` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigArgs {
    /// Repository to resolve. Shows the process-wide config when omitted.
    #[arg(value_name = "REPO")]
    pub repo: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
