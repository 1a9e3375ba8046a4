//! The build pipeline.
//!
//! A [`Builder`] drives every repository of one invocation through its
//! strategy. Each concrete repository gets a `Pipeline` that:
//!
//! 1. runs the strategy's context steps in [`Step::ORDER`], invoking the
//!    builder hooks after each one
//! 2. builds the context and tags the result (`force`)
//! 3. pushes, when the repository is pushable
//! 4. cleans up: the context directory is always removed, and the image it
//!    produced is deleted if any step failed
//!
//! Simple aliases skip context assembly entirely and re-tag the image of
//! the tag they alias, building it first when this invocation has not.

use crate::builder::cache;
use crate::builder::context::BuildContext;
use crate::builder::copy::copy_tree;
use crate::builder::rootfs::RootfsCache;
use crate::builder::state::BuildState;
use crate::builder::strategy::{Step, StrategyKind};
use crate::builder::template;
use crate::engine::{
    docker_config_path, load_credentials, registry_for, BuildRequest, ContainerEngine, ContainerId,
    ContainerSpec, ImageId, ProgressEvent,
};
use crate::error::{Error, Result};
use crate::hooks::{HookContext, HookRegistry, Stage, Subsystem};
use crate::metadata::Value;
use crate::repo::Repo;
use include_dir::{include_dir, Dir};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Strategy Dockerfiles embedded at compile time.
static TEMPLATES_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/templates");

const SCRATCH_TEMPLATE: &str = "scratch.Dockerfile";
const ROOTFS_TEMPLATE: &str = "rootfs.Dockerfile";

/// Result of building one concrete repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// `user/name:tag` (or the rootfs image name for helpers).
    pub reference: String,
    pub image: ImageId,
    pub strategy: StrategyKind,
    pub pushed: bool,
}

/// Builds repositories for one invocation.
///
/// Owns the invocation-scoped state: the rootfs helper memo and the record
/// of images built so far. Memoized rootfs helpers are removed by
/// [`Builder::finish`], or when the builder is dropped.
pub struct Builder<'a> {
    engine: &'a dyn ContainerEngine,
    hooks: &'a HookRegistry,
    rootfs: RootfsCache,
    built: BTreeMap<String, ImageId>,
    in_progress: BTreeSet<String>,
    interrupt: Option<Arc<AtomicBool>>,
    progress: Option<Box<dyn Fn(&ProgressEvent) + 'a>>,
    credentials: Option<PathBuf>,
}

impl<'a> Builder<'a> {
    pub fn new(engine: &'a dyn ContainerEngine, hooks: &'a HookRegistry) -> Self {
        Self {
            engine,
            hooks,
            rootfs: RootfsCache::new(),
            built: BTreeMap::new(),
            in_progress: BTreeSet::new(),
            interrupt: None,
            progress: None,
            credentials: docker_config_path(),
        }
    }

    /// Flag checked between steps; once set, the current build fails with
    /// [`Error::Interrupted`] after cleanup, even when an engine call was
    /// the one that failed.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Receive engine progress events.
    pub fn with_progress(mut self, progress: impl Fn(&ProgressEvent) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Docker client config to read registry credentials from.
    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials = Some(path.into());
        self
    }

    pub fn engine(&self) -> &'a dyn ContainerEngine {
        self.engine
    }

    pub fn rootfs_cache(&self) -> &RootfsCache {
        &self.rootfs
    }

    /// Image built for `reference` during this invocation.
    pub fn built_image(&self, reference: &str) -> Option<&ImageId> {
        self.built.get(reference)
    }

    /// Build one concrete repository.
    ///
    /// # Errors
    ///
    /// Any step failure. Cleanup has already run when this returns.
    pub fn build(&mut self, repo: &Repo) -> Result<BuildOutcome> {
        if !repo.is_concrete() {
            return Err(anyhow::anyhow!("{repo} has no tag; expand it before building").into());
        }

        let reference = repo.reference();
        if !self.in_progress.insert(reference.clone()) {
            return Err(anyhow::anyhow!("alias cycle while building {reference}").into());
        }

        let strategy = StrategyKind::for_repo(repo);
        let result = Pipeline::new(self, repo, strategy).run();
        self.in_progress.remove(&reference);

        let outcome = result?;
        self.built.insert(reference, outcome.image.clone());
        Ok(outcome)
    }

    /// Expand and build every repository, in order, non-aliases first.
    ///
    /// Stops at the first failure.
    pub fn build_all(&mut self, repos: &[Repo]) -> Result<Vec<BuildOutcome>> {
        let mut concrete: Vec<Repo> = Vec::new();
        for repo in repos {
            for expanded in repo.to_repos()? {
                if !concrete.contains(&expanded) {
                    concrete.push(expanded);
                }
            }
        }
        concrete.sort_by_key(|r| StrategyKind::for_repo(r) == StrategyKind::Alias);

        let mut outcomes = Vec::new();
        for repo in &concrete {
            if self.built.contains_key(&repo.reference()) {
                debug!("{} already built", repo.reference());
                continue;
            }
            outcomes.push(self.build(repo)?);
        }
        Ok(outcomes)
    }

    /// End the invocation: remove memoized rootfs helpers that are not kept.
    pub fn finish(&mut self) {
        self.rootfs.teardown(self.engine);
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn check_interrupt(&self) -> Result<()> {
        if self.interrupted() {
            return Err(Error::Interrupted);
        }
        Ok(())
    }

    fn emit(&self, event: &ProgressEvent) {
        if let Some(text) = event.display() {
            debug!("{}", text);
        }
        if let Some(progress) = &self.progress {
            progress(event);
        }
    }
}

impl Drop for Builder<'_> {
    fn drop(&mut self) {
        self.rootfs.teardown(self.engine);
    }
}

/// One build attempt for one concrete repository.
struct Pipeline<'p, 'a> {
    builder: &'p mut Builder<'a>,
    repo: &'p Repo,
    strategy: StrategyKind,
    state: BuildState,
    context: Option<BuildContext>,
    image: Option<ImageId>,
    cleaned: bool,
}

impl<'p, 'a> Pipeline<'p, 'a> {
    fn new(builder: &'p mut Builder<'a>, repo: &'p Repo, strategy: StrategyKind) -> Self {
        Self {
            builder,
            repo,
            strategy,
            state: BuildState::Created,
            context: None,
            image: None,
            cleaned: false,
        }
    }

    fn run(mut self) -> Result<BuildOutcome> {
        info!("Building {} ({})", self.target_reference(), self.strategy);
        match self.execute() {
            Ok((image, pushed)) => {
                self.cleanup(false);
                self.advance(BuildState::Cleaned);
                Ok(BuildOutcome {
                    reference: self.target_reference(),
                    image,
                    strategy: self.strategy,
                    pushed,
                })
            }
            Err(e) => {
                self.advance(BuildState::Failed);
                self.cleanup(true);
                // An engine call aborted by an interrupt fails with its own error.
                if self.builder.interrupted() {
                    debug!("{}: {} after interrupt", self.target_reference(), e);
                    return Err(Error::Interrupted);
                }
                Err(e)
            }
        }
    }

    fn execute(&mut self) -> Result<(ImageId, bool)> {
        if self.strategy == StrategyKind::Alias {
            return self.retag_parent();
        }

        self.run_steps(self.strategy.steps())?;
        self.builder.check_interrupt()?;
        let image = self.build()?;
        let pushed = self.push(&image)?;
        Ok((image, pushed))
    }

    fn advance(&mut self, next: BuildState) {
        if self.state.can_transition_to(next) {
            debug!("{}: {} -> {}", self.target_reference(), self.state, next);
            self.state = next;
        }
    }

    fn target_reference(&self) -> String {
        match self.strategy {
            StrategyKind::RootfsHelper => self.repo.rootfs_image(),
            _ => self.repo.reference(),
        }
    }

    // --- Context assembly -------------------------------------------------

    fn run_steps(&mut self, steps: &[Step]) -> Result<()> {
        if !steps.contains(&Step::SetupContext) {
            return Err(Error::NoSetupContext {
                strategy: self.strategy.to_string(),
                repo: self.repo.reference(),
            });
        }

        let simple = self.uses_simple_copy();
        for step in Step::ORDER.iter().copied().filter(|s| steps.contains(s)) {
            let skipped = (step == Step::SimpleCopy && !simple)
                || (step.is_layer() && simple)
                || (step == Step::CacheContext && !self.repo.is_cacheable());
            if skipped {
                continue;
            }

            self.builder.check_interrupt()?;
            debug!("{}: {}", self.target_reference(), step);
            self.run_step(step)?;

            if let Some(stage) = hook_stage(step) {
                self.run_hooks(Subsystem::Builder, stage)?;
            }
            if step == Step::SetupContext {
                self.advance(BuildState::ContextReady);
            }
        }
        Ok(())
    }

    fn uses_simple_copy(&self) -> bool {
        self.strategy == StrategyKind::RootfsHelper || self.repo.is_simple_copy()
    }

    fn run_step(&mut self, step: Step) -> Result<()> {
        match step {
            Step::SetupContext => self.setup_context(),
            Step::CopyGlobal => match self.repo.global_copy_dir() {
                Some(global) => self.copy_layer(&global),
                None => Ok(()),
            },
            Step::SimpleCopy => self.simple_copy(),
            Step::CopyAll => self.copy_layer(&self.repo.copy_all_dir()),
            Step::CopyType => self.copy_layer(&self.repo.copy_type_dir()),
            Step::CopyTag => self.copy_layer(&self.repo.copy_tag_dir()),
            Step::CopyCleanup => self.copy_cleanup(),
            Step::BuildContext => self.build_rootfs_archive(),
            Step::VerifyContext => self.verify_context(),
            Step::CacheContext => {
                let context = self.context()?;
                cache::store(self.repo, context.path())?;
                Ok(())
            }
        }
    }

    fn context(&self) -> Result<&BuildContext> {
        self.context.as_ref().ok_or_else(|| Error::NoSetupContext {
            strategy: self.strategy.to_string(),
            repo: self.repo.reference(),
        })
    }

    fn setup_context(&mut self) -> Result<()> {
        let copy_name = self
            .repo
            .metadata()
            .get_str("copy_dir")
            .unwrap_or_else(|| "copy".to_string());
        self.context = Some(BuildContext::create(&self.target_reference(), &copy_name)?);

        let dockerfile = self.render_dockerfile()?;
        self.context()?.write_dockerfile(&dockerfile)
    }

    fn render_dockerfile(&self) -> Result<String> {
        let repo = self.repo;
        match self.strategy {
            StrategyKind::TwoStage => {
                let tar_gz = self.tar_gz_name();
                let metadata = repo.metadata();
                template::render(SCRATCH_TEMPLATE, embedded(SCRATCH_TEMPLATE)?, &|key| match key {
                    "tar_gz" => Value::from(tar_gz.as_str()),
                    "env_line" => env_instruction(&metadata.get("env")).into(),
                    "entrypoint_line" => instruction("ENTRYPOINT", &metadata.get("entrypoint")).into(),
                    "cmd_line" => instruction("CMD", &metadata.get("cmd")).into(),
                    other => template_value(repo, other),
                })
            }
            StrategyKind::RootfsHelper => {
                let copy_name = self.context()?.copy_dir();
                let copy_name = copy_name
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "copy".to_string());
                template::render(ROOTFS_TEMPLATE, embedded(ROOTFS_TEMPLATE)?, &|key| match key {
                    "copy_dir" => Value::from(copy_name.as_str()),
                    "mkimg" => Value::from(repo.mkimg_path().display().to_string()),
                    other => template_value(repo, other),
                })
            }
            StrategyKind::Direct | StrategyKind::Alias => {
                let path = repo.dockerfile();
                if !path.is_file() {
                    return Err(Error::MissingDockerfile {
                        repo: repo.reference(),
                        path,
                    });
                }
                let source = fs::read_to_string(&path)?;
                if repo.kind() == "simple" {
                    return Ok(source);
                }
                template::render(&path.display().to_string(), &source, &|key| {
                    template_value(repo, key)
                })
            }
        }
    }

    fn copy_layer(&self, src: &Path) -> Result<()> {
        let context = self.context()?;
        copy_tree(src, &context.copy_dir())?;
        Ok(())
    }

    fn simple_copy(&self) -> Result<()> {
        if self.strategy != StrategyKind::RootfsHelper || self.repo.is_simple_copy() {
            return self.copy_layer(&self.repo.copy_dir());
        }

        let rootfs = self.repo.copy_rootfs_dir();
        if !rootfs.is_dir() {
            return Err(Error::NoRootfsCopyDir {
                repo: self.repo.reference(),
                path: rootfs,
            });
        }
        self.copy_layer(&rootfs)
    }

    /// Keep the rootfs helper script out of a scratch image assembled from
    /// a flat copy tree.
    fn copy_cleanup(&self) -> Result<()> {
        if !self.repo.is_simple_copy() {
            return Ok(());
        }
        let script = self.context()?.copy_dir().join(self.repo.mkimg_path());
        if script.exists() {
            debug!("Removing {} from context", script.display());
            fs::remove_file(script)?;
        }
        Ok(())
    }

    fn verify_context(&self) -> Result<()> {
        let context = self.context()?;
        match self.strategy {
            StrategyKind::RootfsHelper => {
                let script = context.copy_dir().join(self.repo.mkimg_path());
                if !script.is_file() {
                    return Err(Error::NoRootfsMkimg {
                        repo: self.repo.reference(),
                        path: script,
                    });
                }
            }
            StrategyKind::TwoStage => {
                let archive = context.path().join(self.tar_gz_name());
                let size = fs::metadata(&archive).map(|m| m.len()).unwrap_or(0);
                if size == 0 {
                    return Err(Error::InvalidTargzFile {
                        repo: self.repo.reference(),
                        path: archive,
                    });
                }
            }
            StrategyKind::Direct | StrategyKind::Alias => {}
        }
        Ok(())
    }

    fn tar_gz_name(&self) -> String {
        self.repo
            .metadata()
            .get_str("tar_gz")
            .unwrap_or_else(|| "rootfs.tar.gz".to_string())
    }

    // --- Two-stage builds -------------------------------------------------

    fn build_rootfs_archive(&mut self) -> Result<()> {
        let helper = self.rootfs_helper()?;
        let result = self.run_helper(&helper);
        if result.is_err() {
            let engine = self.builder.engine;
            if let Err(e) = self.builder.rootfs.discard(self.repo.name(), engine) {
                warn!("Failed to remove rootfs image for {}: {}", self.repo.name(), e);
            }
        }
        result
    }

    /// The memoized rootfs helper for this repository, built on first use.
    fn rootfs_helper(&mut self) -> Result<ImageId> {
        if let Some(image) = self.builder.rootfs.get(self.repo.name()) {
            debug!("Reusing rootfs image {} for {}", image, self.repo.name());
            return Ok(image.clone());
        }

        let outcome = Pipeline::new(self.builder, self.repo, StrategyKind::RootfsHelper).run()?;
        let keep = self.repo.metadata().get_bool("keep_rootfs");
        self.builder
            .rootfs
            .insert(self.repo.name(), outcome.image.clone(), keep);
        Ok(outcome.image)
    }

    fn run_helper(&self, helper: &ImageId) -> Result<()> {
        let context = self.context()?;
        let tar_gz = context.path().join(self.tar_gz_name());
        let copy_dir = context.copy_dir();
        let spec = ContainerSpec {
            image: helper.clone(),
            env: self.repo.to_env(Some(&tar_gz), Some(&copy_dir)),
            mounts: vec![context.path().to_path_buf()],
        };

        let engine = self.builder.engine;
        let container = engine.create_container(&spec)?;
        let status = self.run_container(&container);
        if status.is_err() {
            if let Err(e) = engine.stop_container(&container) {
                debug!("Failed to stop {}: {}", container, e);
            }
        }
        if let Err(e) = engine.delete_container(&container, true) {
            warn!("Failed to remove helper container {}: {}", container, e);
        }

        let status = status?;
        if status != 0 {
            return Err(Error::BadExitStatus {
                repo: self.repo.reference(),
                status,
            });
        }

        context.remove_copy_dir()
    }

    fn run_container(&self, container: &ContainerId) -> Result<i64> {
        let builder = &*self.builder;
        builder.engine.start_container(container)?;
        builder.engine.follow_logs(container, &|e| builder.emit(e))?;
        builder.engine.wait_container(container)
    }

    // --- Build, tag, push ---------------------------------------------------

    fn build(&mut self) -> Result<ImageId> {
        let request = BuildRequest {
            context: self.context()?.path().to_path_buf(),
        };

        info!("Building image for {}", self.target_reference());
        let builder = &*self.builder;
        let image = builder
            .engine
            .build_image(&request, &|e| builder.emit(e))?;
        self.image = Some(image.clone());

        let reference = self.target_reference();
        let (repository, tag) = reference
            .rsplit_once(':')
            .unwrap_or((reference.as_str(), "latest"));
        self.builder
            .engine
            .tag_image(&image, repository, tag, true)?;
        info!("Tagged {} as {}", image, reference);

        self.advance(BuildState::Built);
        Ok(image)
    }

    fn retag_parent(&mut self) -> Result<(ImageId, bool)> {
        let parent = self.repo.aliased_repo()?.ok_or_else(|| {
            anyhow::anyhow!("{} is not an alias", self.repo.reference())
        })?;
        self.builder.check_interrupt()?;

        let image = match self.builder.built_image(&parent.reference()).cloned() {
            Some(image) => {
                debug!("Reusing {} for {}", parent.reference(), self.repo.reference());
                image
            }
            None => {
                info!(
                    "Building {} before its alias {}",
                    parent.reference(),
                    self.repo.reference()
                );
                self.builder.build(&parent)?.image
            }
        };

        self.builder
            .engine
            .tag_image(&image, &self.repo.repository(), self.repo.tag(), true)?;
        info!("Tagged {} as {}", parent.reference(), self.repo.reference());
        self.advance(BuildState::Built);

        if self.repo.is_cacheable() {
            cache::mirror(&parent, self.repo)?;
        }

        let pushed = self.push(&image)?;
        Ok((image, pushed))
    }

    fn push(&mut self, image: &ImageId) -> Result<bool> {
        if !self.strategy.is_pushable() {
            return Ok(false);
        }
        if !self.repo.is_pushable() {
            debug!("{} is not pushable", self.repo.reference());
            return Ok(false);
        }

        self.builder.check_interrupt()?;
        self.authenticate()?;

        let reference = self.repo.reference();
        info!("Pushing {} ({})", reference, image);
        let builder = &*self.builder;
        builder
            .engine
            .push_image(&reference, &|e| builder.emit(e))?;
        self.run_hooks(Subsystem::Registry, Stage::Push)?;

        self.advance(BuildState::Pushed);
        Ok(true)
    }

    /// Log in to the repository's registry. Registered auth hooks replace
    /// credential-based login.
    fn authenticate(&self) -> Result<()> {
        if self.builder.hooks.has_hooks(Subsystem::Registry, Stage::Auth) {
            return self.run_hooks(Subsystem::Registry, Stage::Auth);
        }

        let server = registry_for(self.repo.user());
        let Some(path) = &self.builder.credentials else {
            warn!("No Docker config found; pushing to {} without login", server);
            return Ok(());
        };

        match load_credentials(path, &server)? {
            Some(credentials) => {
                debug!("Logging in to {} as {}", server, credentials.username);
                self.builder.engine.login(&credentials)
            }
            None => {
                warn!(
                    "No credentials for {} in {}; pushing without login",
                    server,
                    path.display()
                );
                Ok(())
            }
        }
    }

    fn run_hooks(&self, subsystem: Subsystem, stage: Stage) -> Result<()> {
        let ctx = HookContext {
            repo: self.repo,
            context_dir: self.context.as_ref().map(BuildContext::path),
            image: self.image.as_ref(),
            engine: self.builder.engine,
        };
        self.builder.hooks.run(subsystem, stage, &ctx)
    }

    // --- Cleanup ------------------------------------------------------------

    /// Remove the context and, after a failure, the image this attempt
    /// produced. Runs at most once.
    fn cleanup(&mut self, failed: bool) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;

        if let Some(context) = self.context.take() {
            context.close();
        }

        if failed {
            if let Some(image) = self.image.take() {
                info!("Removing image {} of failed build", image);
                if let Err(e) = self.builder.engine.delete_image(&image, true) {
                    warn!("Failed to remove image {}: {}", image, e);
                }
            }
        }
    }
}

impl Drop for Pipeline<'_, '_> {
    fn drop(&mut self) {
        self.cleanup(true);
    }
}

fn hook_stage(step: Step) -> Option<Stage> {
    match step {
        Step::SetupContext => Some(Stage::SetupContext),
        Step::CopyGlobal => Some(Stage::CopyGlobal),
        Step::SimpleCopy => Some(Stage::SimpleCopy),
        Step::CopyAll => Some(Stage::CopyAll),
        Step::CopyType => Some(Stage::CopyType),
        Step::CopyTag => Some(Stage::CopyTag),
        Step::CopyCleanup => None,
        Step::BuildContext => Some(Stage::BuildContext),
        Step::VerifyContext => Some(Stage::VerifyContext),
        Step::CacheContext => Some(Stage::CacheContext),
    }
}

fn embedded(name: &str) -> Result<&'static str> {
    TEMPLATES_DIR
        .get_file(name)
        .and_then(|file| file.contents_utf8())
        .ok_or_else(|| Error::TemplateError {
            template: name.to_string(),
            message: "embedded template missing".to_string(),
        })
}

/// Value of a template placeholder: repository built-ins, then metadata.
fn template_value(repo: &Repo, key: &str) -> Value {
    match key {
        "name" => Value::from(repo.name()),
        "tag" => Value::from(repo.tag()),
        "user" => Value::from(repo.user()),
        "type" => Value::from(repo.kind()),
        "group" => Value::from(repo.group()),
        "repo" => Value::from(repo.repository()),
        "maintainer_line" => match repo.metadata().get_str("maintainer") {
            Some(maintainer) => Value::from(format!("LABEL maintainer=\"{maintainer}\"")),
            None => Value::Nil,
        },
        other => repo.metadata().get(other),
    }
}

/// `KEYWORD ...` for an exec-form list or shell-form string, empty for nil.
fn instruction(keyword: &str, value: &Value) -> String {
    match value {
        Value::Nil => String::new(),
        Value::List(_) => format!(
            "{keyword} {}",
            serde_json::to_string(value).unwrap_or_default()
        ),
        other => {
            let text = other.to_plain_string();
            if text.is_empty() {
                String::new()
            } else {
                format!("{keyword} {text}")
            }
        }
    }
}

fn env_instruction(env: &Value) -> String {
    let text = env.to_plain_string();
    if text.trim().is_empty() {
        String::new()
    } else {
        format!("ENV {text}")
    }
}
