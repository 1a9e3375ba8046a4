//! Config command implementation.
//!
//! The `dockwright config` command shows the process-wide configuration,
//! or the metadata of one repository resolved for its tag.

use std::path::{Path, PathBuf};

use crate::cli::args::ConfigArgs;
use crate::error::Result;
use crate::metadata::Value;
use crate::repo::Repo;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::open_workspace;

/// The config command implementation.
pub struct ConfigCommand {
    project_root: PathBuf,
    args: ConfigArgs,
}

impl ConfigCommand {
    pub fn new(project_root: &Path, args: ConfigArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }

    fn render(&self, value: &Value) -> Result<String> {
        let text = if self.args.json {
            serde_json::to_string_pretty(value).map_err(anyhow::Error::from)?
        } else {
            serde_yaml::to_string(value).map_err(anyhow::Error::from)?
        };
        Ok(text.trim_end().to_string())
    }
}

impl Command for ConfigCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let workspace = open_workspace(&self.project_root, &Value::mapping())?;

        let value = match &self.args.repo {
            Some(identifier) => {
                let repo = Repo::parse(identifier, &workspace)?;
                repo.metadata().to_value()
            }
            None => {
                if let Some(source) = workspace.config().source() {
                    if !self.args.json {
                        ui.message(&format!("# {}", source.display()));
                    }
                }
                workspace.config().data().clone()
            }
        };

        ui.message(&self.render(&value)?);
        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use std::fs;
    use tempfile::TempDir;

    fn workspace() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("opts.yml"), "user: acme\n").unwrap();
        let web = temp.path().join("repos/web");
        fs::create_dir_all(&web).unwrap();
        fs::write(
            web.join("opts.yml"),
            "tags: { latest: {}, '1.0': {} }\npackages:\n  tag:\n    '1.0': [curl]\n  all: [bash]\n",
        )
        .unwrap();
        temp
    }

    #[test]
    fn resolves_repository_metadata_for_tag() {
        let temp = workspace();
        let mut ui = MockUI::new();
        let args = ConfigArgs {
            repo: Some("web:1.0".to_string()),
            json: true,
        };

        ConfigCommand::new(temp.path(), args).execute(&mut ui).unwrap();

        let json: serde_json::Value = serde_json::from_str(&ui.messages()[0]).unwrap();
        assert_eq!(json["user"], "acme");
        assert_eq!(json["packages"], serde_json::json!(["bash", "curl"]));
    }

    #[test]
    fn shows_process_config_with_source() {
        let temp = workspace();
        let mut ui = MockUI::new();

        ConfigCommand::new(temp.path(), ConfigArgs::default())
            .execute(&mut ui)
            .unwrap();

        assert!(ui.messages()[0].starts_with("# "));
        assert!(ui.messages()[0].ends_with("opts.yml"));
        assert!(ui.messages()[1].contains("user: acme"));
    }
}
