//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait and is routed by
//! [`CommandDispatcher`].

pub mod build;
pub mod completions;
pub mod config;
pub mod dispatcher;
pub mod list;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};

use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::metadata::Value;
use crate::repo::{Repo, Workspace};

/// Open the workspace at `root`, with `overrides` merged over its config.
pub(crate) fn open_workspace(root: &Path, overrides: &Value) -> Result<Workspace> {
    let config = Config::load(root)?.with_overrides(overrides);
    Ok(Workspace::new(root, Arc::new(config)))
}

/// Descriptors for the requested identifiers, or for every repository in
/// the workspace when none are given.
///
/// Every descriptor is constructed before any is used, so a bad identifier
/// fails the command before the engine is touched.
pub(crate) fn resolve_repos(workspace: &Workspace, identifiers: &[String]) -> Result<Vec<Repo>> {
    let identifiers = if identifiers.is_empty() {
        workspace.repo_names()?
    } else {
        identifiers.to_vec()
    };

    identifiers
        .iter()
        .map(|id| Repo::parse(id, workspace))
        .collect()
}
