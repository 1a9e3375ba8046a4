//! Build command implementation.
//!
//! The `dockwright build` command builds every requested repository in
//! order and stops at the first failure.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use console::Term;

use crate::builder::{BuildOutcome, Builder, StrategyKind};
use crate::cli::args::BuildArgs;
use crate::engine::{ContainerEngine, DockerCli, ProgressEvent};
use crate::error::Result;
use crate::hooks::HookRegistry;
use crate::ui::{progress_callback, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::{open_workspace, resolve_repos};

/// Number of engine output lines shown under a spinner.
const LIVE_LINES: usize = 3;

type Sink = Box<dyn Fn(&ProgressEvent)>;

/// The build command implementation.
pub struct BuildCommand<'e> {
    project_root: PathBuf,
    args: BuildArgs,
    interrupt: Arc<AtomicBool>,
    engine: Option<&'e dyn ContainerEngine>,
}

impl<'e> BuildCommand<'e> {
    pub fn new(project_root: &Path, args: BuildArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
            interrupt: Arc::new(AtomicBool::new(false)),
            engine: None,
        }
    }

    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    pub fn with_engine(mut self, engine: &'e dyn ContainerEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn args(&self) -> &BuildArgs {
        &self.args
    }
}

impl Command for BuildCommand<'_> {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let workspace = open_workspace(&self.project_root, &self.args.overrides())?;
        let repos = resolve_repos(&workspace, &self.args.repos)?;
        if repos.is_empty() {
            ui.warning(&format!(
                "No repositories found under {}",
                workspace.repos_dir().display()
            ));
            return Ok(CommandResult::success());
        }

        let docker;
        let engine: &dyn ContainerEngine = match self.engine {
            Some(engine) => engine,
            None => {
                docker = DockerCli::new(workspace.config().get_str("engine").unwrap_or("docker"));
                &docker
            }
        };

        let mode = ui.output_mode();
        let animate = mode.shows_spinners() && ui.is_interactive();
        let echo = mode.shows_engine_output();

        // The builder keeps one progress sink; each repository swaps in its own.
        let current: RefCell<Option<Sink>> = RefCell::new(None);
        let hooks = HookRegistry::with_builtin_points();
        let mut builder = Builder::new(engine, &hooks)
            .with_interrupt(Arc::clone(&self.interrupt))
            .with_progress(|event: &ProgressEvent| {
                if let Some(sink) = current.borrow().as_ref() {
                    sink(event);
                }
            });

        let mut result = Ok(());
        for repo in &repos {
            let label = format!("Building {}", repo);
            let mut spinner = animate.then(|| ui.start_spinner(&label));

            let sink: Option<Sink> = match spinner.as_ref().and_then(|s| s.progress_bar()) {
                Some(bar) => {
                    let callback = progress_callback(bar, label.clone(), LIVE_LINES);
                    Some(Box::new(callback) as Sink)
                }
                None if echo => Some(Box::new(echo_event) as Sink),
                None => None,
            };
            *current.borrow_mut() = sink;

            if !animate {
                ui.message(&label);
            }

            match builder.build_all(std::slice::from_ref(repo)) {
                Ok(outcomes) => {
                    let lines: Vec<String> = outcomes.iter().map(describe).collect();
                    match spinner.as_mut() {
                        Some(spinner) => spinner.finish_success(&lines.join(", ")),
                        None => lines.iter().for_each(|line| ui.success(line)),
                    }
                }
                Err(e) => {
                    if let Some(spinner) = spinner.as_mut() {
                        spinner.finish_error(&format!("Failed to build {}", repo));
                    }
                    result = Err(e);
                    break;
                }
            }
        }

        *current.borrow_mut() = None;
        builder.finish();
        result.map(|()| CommandResult::success())
    }
}

fn echo_event(event: &ProgressEvent) {
    if let Some(text) = event.display() {
        Term::stderr().write_line(&text).ok();
    }
}

fn describe(outcome: &BuildOutcome) -> String {
    let verb = match (outcome.strategy, outcome.pushed) {
        (StrategyKind::Alias, false) => "Tagged",
        (StrategyKind::Alias, true) => "Tagged and pushed",
        (_, false) => "Built",
        (_, true) => "Built and pushed",
    };
    format!("{} {}", verb, outcome.reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;
    use crate::error::Error;
    use crate::ui::MockUI;
    use std::fs;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn workspace() -> TempDir {
        let temp = TempDir::new().unwrap();
        let web = temp.path().join("repos/web");
        fs::create_dir_all(&web).unwrap();
        fs::write(web.join("Dockerfile"), "FROM {{ from }}\n").unwrap();
        fs::write(
            web.join("opts.yml"),
            "tags: { latest: {}, '1.0': {} }\naliases: { edge: latest }\n",
        )
        .unwrap();

        let base = temp.path().join("repos/base");
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("Dockerfile"), "FROM alpine\n").unwrap();
        temp
    }

    #[test]
    fn builds_every_repository_when_none_named() {
        let temp = workspace();
        let engine = MockEngine::new();
        let mut ui = MockUI::new();

        let cmd = BuildCommand::new(temp.path(), BuildArgs::default()).with_engine(&engine);
        let result = cmd.execute(&mut ui).unwrap();

        assert!(result.success);
        assert_eq!(ui.messages(), ["Building local/base", "Building local/web"]);
        assert_eq!(
            ui.successes(),
            [
                "Built local/base:latest",
                "Built local/web:1.0",
                "Built local/web:latest",
                "Tagged local/web:edge",
            ]
        );
        assert_eq!(engine.builds().len(), 3);
    }

    #[test]
    fn push_flag_pushes_images() {
        let temp = workspace();
        let engine = MockEngine::new();
        let mut ui = MockUI::new();
        let args = BuildArgs {
            repos: vec!["base".to_string()],
            push: true,
            ..Default::default()
        };

        BuildCommand::new(temp.path(), args)
            .with_engine(&engine)
            .execute(&mut ui)
            .unwrap();

        assert_eq!(engine.pushed(), vec!["local/base:latest".to_string()]);
        assert_eq!(ui.successes(), ["Built and pushed local/base:latest"]);
    }

    #[test]
    fn invalid_repository_fails_before_engine_calls() {
        let temp = workspace();
        let engine = MockEngine::new();
        let mut ui = MockUI::new();
        let args = BuildArgs {
            repos: vec!["base".to_string(), "Not A Repo".to_string()],
            ..Default::default()
        };

        let err = BuildCommand::new(temp.path(), args)
            .with_engine(&engine)
            .execute(&mut ui)
            .unwrap_err();

        assert!(matches!(err, Error::InvalidRepoName { .. }));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn stops_at_first_failure() {
        let temp = workspace();
        let engine = MockEngine::new().fail_on("build");
        let mut ui = MockUI::new();

        let err = BuildCommand::new(temp.path(), BuildArgs::default())
            .with_engine(&engine)
            .execute(&mut ui)
            .unwrap_err();

        assert!(matches!(err, Error::EngineFailed { .. }));
        assert_eq!(ui.messages(), ["Building local/base"]);
        assert!(ui.successes().is_empty());
    }

    #[test]
    fn interrupted_build_reports_interrupt() {
        let temp = workspace();
        let engine = MockEngine::new();
        let mut ui = MockUI::new();
        let flag = Arc::new(AtomicBool::new(false));
        flag.store(true, Ordering::SeqCst);

        let err = BuildCommand::new(temp.path(), BuildArgs::default())
            .with_engine(&engine)
            .with_interrupt(flag)
            .execute(&mut ui)
            .unwrap_err();

        assert!(matches!(err, Error::Interrupted));
        assert!(engine.builds().is_empty());
    }

    #[test]
    fn empty_workspace_warns() {
        let temp = TempDir::new().unwrap();
        let engine = MockEngine::new();
        let mut ui = MockUI::new();

        let result = BuildCommand::new(temp.path(), BuildArgs::default())
            .with_engine(&engine)
            .execute(&mut ui)
            .unwrap();

        assert!(result.success);
        assert_eq!(ui.warnings().len(), 1);
    }
}
