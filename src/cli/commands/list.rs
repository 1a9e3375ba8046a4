//! List command implementation.
//!
//! The `dockwright list` command shows every repository, the tags it
//! expands to and the strategy each tag builds with.

use std::path::{Path, PathBuf};

use crate::builder::StrategyKind;
use crate::cli::args::ListArgs;
use crate::engine::ContainerEngine;
use crate::error::Result;
use crate::metadata::Value;
use crate::repo::Repo;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::{open_workspace, resolve_repos};

/// The list command implementation.
pub struct ListCommand<'e> {
    project_root: PathBuf,
    args: ListArgs,
    engine: Option<&'e dyn ContainerEngine>,
}

impl<'e> ListCommand<'e> {
    pub fn new(project_root: &Path, args: ListArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
            engine: None,
        }
    }

    /// Mark tags whose image exists in `engine`.
    pub fn with_engine(mut self, engine: &'e dyn ContainerEngine) -> Self {
        self.engine = Some(engine);
        self
    }
}

impl Command for ListCommand<'_> {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let workspace = open_workspace(&self.project_root, &Value::mapping())?;
        let repos = resolve_repos(&workspace, &self.args.repos)?;
        if repos.is_empty() {
            ui.warning(&format!(
                "No repositories found under {}",
                workspace.repos_dir().display()
            ));
            return Ok(CommandResult::success());
        }

        for repo in &repos {
            ui.show_header(&format!("{} ({})", repo, repo.kind()));
            for tag in repo.to_repos()? {
                ui.message(&self.describe(&tag)?);
            }
        }

        Ok(CommandResult::success())
    }
}

impl ListCommand<'_> {
    fn describe(&self, repo: &Repo) -> Result<String> {
        let strategy = StrategyKind::for_repo(repo);
        let mut line = format!("  {:<12} {}", repo.tag(), strategy);

        if let Some(parent) = repo.aliased_repo()? {
            line.push_str(&format!(" -> {}", parent.tag()));
        }
        if repo.is_pushable() {
            line.push_str(" [push]");
        }
        if let Some(engine) = self.engine {
            if engine.find_image(&repo.reference())?.is_some() {
                line.push_str(" [built]");
            }
        }
        Ok(line)
    }
}
