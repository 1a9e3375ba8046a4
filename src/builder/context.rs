//! Transient build contexts.

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// A build-scoped directory holding a `Dockerfile` and a `copy/` tree.
///
/// The directory is removed by [`BuildContext::close`], or when the value is
/// dropped.
#[derive(Debug)]
pub struct BuildContext {
    dir: TempDir,
    copy_name: String,
}

impl BuildContext {
    /// Create an empty context for `label` (used in the directory name).
    pub fn create(label: &str, copy_name: &str) -> Result<Self> {
        let prefix: String = format!("dockwright-{label}-")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
            .collect();
        let dir = tempfile::Builder::new().prefix(&prefix).tempdir()?;
        fs::create_dir_all(dir.path().join(copy_name))?;
        debug!("Created build context {}", dir.path().display());
        Ok(Self {
            dir,
            copy_name: copy_name.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn dockerfile(&self) -> PathBuf {
        self.path().join("Dockerfile")
    }

    /// Root of the copied file tree.
    pub fn copy_dir(&self) -> PathBuf {
        self.path().join(&self.copy_name)
    }

    pub fn write_dockerfile(&self, content: &str) -> Result<()> {
        fs::write(self.dockerfile(), content)?;
        Ok(())
    }

    /// Remove the copy tree, keeping the rest of the context.
    pub fn remove_copy_dir(&self) -> Result<()> {
        let copy = self.copy_dir();
        if copy.exists() {
            fs::remove_dir_all(copy)?;
        }
        Ok(())
    }

    /// Delete the context directory.
    pub fn close(self) {
        let path = self.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Removed build context {}", path.display()),
            Err(e) => warn!("Failed to remove build context {}: {}", path.display(), e),
        }
    }
}
