//! Filesystem layout of a template workspace.
//!
//! ```text
//! <root>/
//!   opts.yml             process-wide overrides
//!   copy/                global copy layer shared by every repository
//!   cache/<name>/<tag>/  cached build contexts
//!   repos/<name>/
//!     Dockerfile
//!     opts.yml           repository overrides
//!     copy/              flat, or layered into tag/ type/ all/ rootfs/
//! ```
//!
//! In single-repository (project) mode the root itself is the only
//! repository and there is no separate global copy layer.

use crate::config::Config;
use crate::error::Result;
use crate::metadata::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A template workspace rooted at one directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: Arc<Config>,
    project_mode: bool,
}

impl Workspace {
    /// Create a workspace, detecting project mode when the config leaves it
    /// unset.
    pub fn new(root: impl Into<PathBuf>, config: Arc<Config>) -> Self {
        let root = root.into();
        let project_mode = match config.get("project_mode") {
            Value::Nil => {
                root.join("Dockerfile").is_file()
                    && !root.join(dir_name(&config, "repos_dir", "repos")).is_dir()
            }
            other => other.is_truthy(),
        };
        Self {
            root,
            config,
            project_mode,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn is_project_mode(&self) -> bool {
        self.project_mode
    }

    /// Directory holding one sub-directory per repository.
    pub fn repos_dir(&self) -> PathBuf {
        self.root.join(self.dir("repos_dir", "repos"))
    }

    /// Root directory of the repository `name`.
    pub fn repo_root(&self, name: &str) -> PathBuf {
        if self.project_mode {
            self.root.clone()
        } else {
            self.repos_dir().join(name)
        }
    }

    /// Copy root shared by every repository. Absent in project mode.
    pub fn global_copy_dir(&self) -> Option<PathBuf> {
        if self.project_mode {
            None
        } else {
            Some(self.root.join(self.dir("copy_dir", "copy")))
        }
    }

    /// Root of the context cache.
    pub fn cache_root(&self) -> PathBuf {
        self.root.join(self.dir("cache_dir", "cache"))
    }

    /// Name of the repository in project mode.
    pub fn project_name(&self) -> String {
        self.config
            .get_str("name")
            .map(str::to_string)
            .or_else(|| {
                self.root
                    .file_name()
                    .map(|n| n.to_string_lossy().to_lowercase())
            })
            .unwrap_or_else(|| "project".to_string())
    }

    /// Names of every repository in the workspace, sorted.
    pub fn repo_names(&self) -> Result<Vec<String>> {
        if self.project_mode {
            return Ok(vec![self.project_name()]);
        }

        let dir = self.repos_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// A directory name from config.
    pub fn dir(&self, key: &str, default: &str) -> String {
        dir_name(&self.config, key, default)
    }
}

fn dir_name(config: &Config, key: &str, default: &str) -> String {
    config.get_str(key).unwrap_or(default).to_string()
}
