//! Layered copy into a build context.

use crate::error::Result;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Recursively copy `src` into `dst`, overwriting existing files.
///
/// A missing `src` copies nothing. Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    if !src.exists() {
        debug!("Nothing to copy from {}", src.display());
        return Ok(0);
    }

    fs::create_dir_all(dst)?;
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            copied += copy_tree(&from, &to)?;
        } else if file_type.is_symlink() {
            copy_symlink(&from, &to)?;
            copied += 1;
        } else {
            if to.is_dir() {
                fs::remove_dir_all(&to)?;
            }
            fs::copy(&from, &to)?;
            copied += 1;
        }
    }

    debug!("Copied {} files from {}", copied, src.display());
    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let target = fs::read_link(from)?;
    if to.symlink_metadata().is_ok() {
        fs::remove_file(to)?;
    }
    std::os::unix::fs::symlink(target, to)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)?;
    Ok(())
}
