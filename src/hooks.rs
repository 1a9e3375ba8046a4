//! Pipeline extension points.
//!
//! A [`HookRegistry`] maps `(Subsystem, Stage)` points to ordered lists of
//! callbacks. The build pipeline runs the callbacks for a point right after
//! the step of the same name; callbacks registered for
//! `(Registry, Auth)` replace credential-based registry login.
//!
//! ```
//! use dockwright::hooks::{HookRegistry, Stage, Subsystem};
//!
//! let mut hooks = HookRegistry::with_builtin_points();
//! hooks
//!     .register(Subsystem::Builder, Stage::CopyTag, |ctx| {
//!         println!("copied tag layer for {}", ctx.repo);
//!         Ok(())
//!     })
//!     .unwrap();
//! assert!(hooks.has_hooks(Subsystem::Builder, Stage::CopyTag));
//! ```

use crate::engine::{ContainerEngine, ImageId};
use crate::error::{Error, Result};
use crate::repo::Repo;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// Owner of a group of extension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subsystem {
    Builder,
    Registry,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subsystem::Builder => write!(f, "builder"),
            Subsystem::Registry => write!(f, "registry"),
        }
    }
}

/// Pipeline stage an extension point is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    SetupContext,
    CopyGlobal,
    SimpleCopy,
    CopyAll,
    CopyType,
    CopyTag,
    BuildContext,
    VerifyContext,
    CacheContext,
    Push,
    Auth,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::SetupContext => "setup_context",
            Stage::CopyGlobal => "copy_global",
            Stage::SimpleCopy => "simple_copy",
            Stage::CopyAll => "copy_all",
            Stage::CopyType => "copy_type",
            Stage::CopyTag => "copy_tag",
            Stage::BuildContext => "build_context",
            Stage::VerifyContext => "verify_context",
            Stage::CacheContext => "cache_context",
            Stage::Push => "push",
            Stage::Auth => "auth",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const BUILDER_STAGES: &[Stage] = &[
    Stage::SetupContext,
    Stage::CopyGlobal,
    Stage::SimpleCopy,
    Stage::CopyAll,
    Stage::CopyType,
    Stage::CopyTag,
    Stage::BuildContext,
    Stage::VerifyContext,
    Stage::CacheContext,
];

const REGISTRY_STAGES: &[Stage] = &[Stage::Push, Stage::Auth];

/// What a hook can see of the running build.
pub struct HookContext<'a> {
    pub repo: &'a Repo,
    /// Build context directory, while one exists.
    pub context_dir: Option<&'a Path>,
    /// Image produced so far, if any.
    pub image: Option<&'a ImageId>,
    pub engine: &'a dyn ContainerEngine,
}

/// A registered callback.
pub type Hook = Box<dyn Fn(&HookContext<'_>) -> Result<()>>;

/// Registry of declared extension points and their callbacks.
#[derive(Default)]
pub struct HookRegistry {
    points: BTreeSet<(Subsystem, Stage)>,
    hooks: BTreeMap<(Subsystem, Stage), Vec<Hook>>,
}

impl HookRegistry {
    /// Empty registry with no declared points.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every point the pipeline runs declared.
    pub fn with_builtin_points() -> Self {
        let mut registry = Self::new();
        for stage in BUILDER_STAGES {
            registry.register_point(Subsystem::Builder, *stage);
        }
        for stage in REGISTRY_STAGES {
            registry.register_point(Subsystem::Registry, *stage);
        }
        registry
    }

    /// Declare an extension point. Declaring it again is a no-op.
    pub fn register_point(&mut self, subsystem: Subsystem, stage: Stage) {
        self.points.insert((subsystem, stage));
    }

    pub fn is_declared(&self, subsystem: Subsystem, stage: Stage) -> bool {
        self.points.contains(&(subsystem, stage))
    }

    /// Add a callback to a declared point.
    ///
    /// # Errors
    ///
    /// `UnknownHookPoint` if the point was never declared.
    pub fn register<F>(&mut self, subsystem: Subsystem, stage: Stage, hook: F) -> Result<()>
    where
        F: Fn(&HookContext<'_>) -> Result<()> + 'static,
    {
        if !self.is_declared(subsystem, stage) {
            return Err(Error::UnknownHookPoint {
                subsystem: subsystem.to_string(),
                stage: stage.to_string(),
            });
        }
        self.hooks
            .entry((subsystem, stage))
            .or_default()
            .push(Box::new(hook));
        Ok(())
    }

    pub fn has_hooks(&self, subsystem: Subsystem, stage: Stage) -> bool {
        self.hooks
            .get(&(subsystem, stage))
            .is_some_and(|hooks| !hooks.is_empty())
    }

    /// Run every callback for a point in registration order.
    ///
    /// Stops at and returns the first failure.
    pub fn run(&self, subsystem: Subsystem, stage: Stage, ctx: &HookContext<'_>) -> Result<()> {
        if let Some(hooks) = self.hooks.get(&(subsystem, stage)) {
            for hook in hooks {
                hook(ctx)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<String, usize> = self
            .hooks
            .iter()
            .map(|((subsystem, stage), hooks)| (format!("{subsystem}/{stage}"), hooks.len()))
            .collect();
        f.debug_struct("HookRegistry")
            .field("points", &self.points.len())
            .field("hooks", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::MockEngine;
    use crate::repo::{RepoSpec, Workspace};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Repo) {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("repos/demo")).unwrap();
        let ws = Workspace::new(temp.path(), Arc::new(Config::defaults()));
        let repo = Repo::new(RepoSpec::new("demo").with_tag("latest"), &ws).unwrap();
        (temp, repo)
    }

    #[test]
    fn register_requires_declared_point() {
        let mut hooks = HookRegistry::new();
        let err = hooks
            .register(Subsystem::Registry, Stage::Auth, |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownHookPoint { .. }));
        assert_eq!(err.to_string(), "Unknown hook point: registry/auth");
    }

    #[test]
    fn register_point_is_idempotent() {
        let mut hooks = HookRegistry::new();
        hooks.register_point(Subsystem::Builder, Stage::CopyTag);
        hooks.register(Subsystem::Builder, Stage::CopyTag, |_| Ok(())).unwrap();
        hooks.register_point(Subsystem::Builder, Stage::CopyTag);
        assert!(hooks.has_hooks(Subsystem::Builder, Stage::CopyTag));
    }

    #[test]
    fn builtin_points_cover_pipeline_stages() {
        let hooks = HookRegistry::with_builtin_points();
        assert!(hooks.is_declared(Subsystem::Builder, Stage::SetupContext));
        assert!(hooks.is_declared(Subsystem::Builder, Stage::CacheContext));
        assert!(hooks.is_declared(Subsystem::Registry, Stage::Auth));
        assert!(!hooks.is_declared(Subsystem::Registry, Stage::CopyTag));
    }

    #[test]
    fn run_in_registration_order() {
        let (_temp, repo) = fixture();
        let engine = MockEngine::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = HookRegistry::with_builtin_points();
        for n in 1..=3 {
            let order = Rc::clone(&order);
            hooks
                .register(Subsystem::Registry, Stage::Push, move |_| {
                    order.borrow_mut().push(n);
                    Ok(())
                })
                .unwrap();
        }

        let ctx = HookContext {
            repo: &repo,
            context_dir: None,
            image: None,
            engine: &engine,
        };
        hooks.run(Subsystem::Registry, Stage::Push, &ctx).unwrap();
        assert_eq!(*order.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn run_stops_at_first_failure() {
        let (_temp, repo) = fixture();
        let engine = MockEngine::new();
        let ran = Rc::new(RefCell::new(false));
        let mut hooks = HookRegistry::with_builtin_points();
        hooks
            .register(Subsystem::Builder, Stage::VerifyContext, |_| {
                Err(Error::engine("verify", "nope"))
            })
            .unwrap();
        let ran_clone = Rc::clone(&ran);
        hooks
            .register(Subsystem::Builder, Stage::VerifyContext, move |_| {
                *ran_clone.borrow_mut() = true;
                Ok(())
            })
            .unwrap();

        let ctx = HookContext {
            repo: &repo,
            context_dir: None,
            image: None,
            engine: &engine,
        };
        assert!(hooks.run(Subsystem::Builder, Stage::VerifyContext, &ctx).is_err());
        assert!(!*ran.borrow());
    }

    #[test]
    fn run_without_hooks_is_ok() {
        let (_temp, repo) = fixture();
        let engine = MockEngine::new();
        let hooks = HookRegistry::with_builtin_points();
        let ctx = HookContext {
            repo: &repo,
            context_dir: None,
            image: None,
            engine: &engine,
        };
        assert!(hooks.run(Subsystem::Builder, Stage::CopyAll, &ctx).is_ok());
    }
}
