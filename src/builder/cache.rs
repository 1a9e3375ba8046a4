//! Durable copies of build contexts.
//!
//! `cache_context` mirrors a finished context into
//! `<cache_dir>/<name>/<tag>/` together with a `.dockwright-cache.json`
//! record describing what was cached.

use crate::builder::copy::copy_tree;
use crate::error::{Error, Result};
use crate::repo::Repo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Record file written next to a cached context.
pub const RECORD_FILE: &str = ".dockwright-cache.json";

/// Description of a cached context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// `user/name:tag` the context was built for.
    pub repo: String,
    pub cached_at: DateTime<Utc>,
    /// SHA-256 of the context's Dockerfile, hex encoded.
    pub dockerfile_sha256: String,
}

/// Copy `context` into the repository's cache directory, replacing any
/// previous copy.
pub fn store(repo: &Repo, context: &Path) -> Result<PathBuf> {
    let dest = repo.cache_dir();
    replace_dir(context, &dest)?;

    let record = CacheRecord {
        repo: repo.reference(),
        cached_at: Utc::now(),
        dockerfile_sha256: dockerfile_digest(&dest)?,
    };
    write_record(&dest, &record)?;

    info!("Cached context for {} at {}", repo.reference(), dest.display());
    Ok(dest)
}

/// Mirror `parent`'s cached context into `alias`'s cache directory.
///
/// Returns `Ok(None)` when the parent has no cached context.
pub fn mirror(parent: &Repo, alias: &Repo) -> Result<Option<PathBuf>> {
    let src = parent.cache_dir();
    if !src.is_dir() {
        return Ok(None);
    }

    let dest = alias.cache_dir();
    replace_dir(&src, &dest)?;

    let record = CacheRecord {
        repo: alias.reference(),
        cached_at: Utc::now(),
        dockerfile_sha256: dockerfile_digest(&dest)?,
    };
    write_record(&dest, &record)?;

    info!(
        "Mirrored cached context of {} to {}",
        parent.reference(),
        alias.reference()
    );
    Ok(Some(dest))
}

/// Read the record of a cached context, if there is one.
pub fn read_record(dir: &Path) -> Result<Option<CacheRecord>> {
    let path = dir.join(RECORD_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| Error::ConfigParseError {
            path,
            message: e.to_string(),
        })
}

fn replace_dir(src: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        fs::remove_dir_all(dest)?;
    }
    fs::create_dir_all(dest)?;
    copy_tree(src, dest)?;
    Ok(())
}

fn write_record(dir: &Path, record: &CacheRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record).map_err(anyhow::Error::from)?;
    fs::write(dir.join(RECORD_FILE), json)?;
    Ok(())
}

fn dockerfile_digest(dir: &Path) -> Result<String> {
    let path = dir.join("Dockerfile");
    let bytes = if path.is_file() { fs::read(path)? } else { Vec::new() };
    Ok(hex::encode(Sha256::digest(&bytes)))
}
