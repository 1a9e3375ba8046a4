//! Repository descriptors.
//!
//! A [`Repo`] identifies one repository (`user/name`) and optionally one of
//! its tags. A tagless descriptor stands for every tag the repository
//! defines and must be expanded with [`Repo::to_repos`] before it can be
//! built.

use crate::config::{deep_merge, find_override_file, load_override_file, Config};
use crate::error::{Error, Result};
use crate::metadata::{Metadata, Value};
use crate::repo::name::RepoName;
use crate::repo::paths::Workspace;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Input for constructing a [`Repo`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoSpec {
    pub name: String,
    pub user: Option<String>,
    pub tag: Option<String>,
    /// Build type override (`normal`, `simple`, `scratch`, ...).
    pub kind: Option<String>,
}

impl RepoSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Parse a `[user/]name[:tag]` identifier.
    pub fn parse(identifier: &str) -> Result<Self> {
        Ok(RepoName::parse(identifier)?.into())
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }
}

impl From<RepoName> for RepoSpec {
    fn from(name: RepoName) -> Self {
        Self {
            name: name.name,
            user: name.user,
            tag: name.tag,
            kind: None,
        }
    }
}

/// A repository, optionally narrowed to one tag.
#[derive(Debug, Clone)]
pub struct Repo {
    user: String,
    name: String,
    tag: Option<String>,
    kind: String,
    kind_override: Option<String>,
    workspace: Workspace,
    metadata: Metadata,
}

impl Repo {
    /// Construct a descriptor.
    ///
    /// Loads the repository's own override file and merges it over the
    /// process configuration.
    ///
    /// # Errors
    ///
    /// - `InvalidRepoName` if the name, user or tag is malformed
    /// - `RepoNotFound` if the repository directory does not exist
    /// - `UnknownBuildType` if the type is not a configured build type
    /// - config errors from the repository override file
    pub fn new(spec: RepoSpec, workspace: &Workspace) -> Result<Self> {
        validate_spec(&spec)?;

        let root = workspace.repo_root(&spec.name);
        if !root.is_dir() {
            return Err(Error::RepoNotFound {
                name: spec.name.clone(),
                path: root,
            });
        }

        let config = workspace.config();
        let mut data = config.data().clone();
        if let Some(path) = find_override_file(&root) {
            debug!("Loading {} overrides from {}", spec.name, path.display());
            data = deep_merge(&data, &load_override_file(&path)?);
        }

        let default_tag = config.get_str("tag").unwrap_or("latest").to_string();
        let tag = spec.tag.clone().unwrap_or(default_tag);
        let metadata = Metadata::root_with_defaults(data, &tag, Some(Arc::clone(config)));

        let user = match &spec.user {
            Some(user) => user.clone(),
            None => metadata
                .get_str("user")
                .unwrap_or_else(|| "local".to_string()),
        };

        let kind = resolve_kind(&metadata, spec.kind.as_deref(), config)?;

        Ok(Self {
            user,
            name: spec.name,
            tag: spec.tag,
            kind,
            kind_override: spec.kind,
            workspace: workspace.clone(),
            metadata,
        })
    }

    /// Parse an identifier and construct a descriptor.
    pub fn parse(identifier: &str, workspace: &Workspace) -> Result<Self> {
        Self::new(RepoSpec::parse(identifier)?, workspace)
    }

    /// This repository narrowed to `tag`. Root metadata is shared.
    pub fn with_tag(&self, tag: &str) -> Result<Self> {
        let metadata = self.metadata.with_tag(tag);
        let kind = resolve_kind(
            &metadata,
            self.kind_override.as_deref(),
            self.workspace.config(),
        )?;
        Ok(Self {
            user: self.user.clone(),
            name: self.name.clone(),
            tag: Some(tag.to_string()),
            kind,
            kind_override: self.kind_override.clone(),
            workspace: self.workspace.clone(),
            metadata,
        })
    }

    /// Expand into concrete descriptors.
    ///
    /// A tagged descriptor expands to itself. A tagless one expands to one
    /// descriptor per tag named in `tags` or `aliases` (or the default tag
    /// when neither names any).
    pub fn to_repos(&self) -> Result<Vec<Repo>> {
        if self.tag.is_some() {
            return Ok(vec![self.clone()]);
        }

        let mut tags = self.metadata.tags();
        if tags.is_empty() {
            tags.insert(self.metadata.tag().to_string());
        }

        tags.iter().map(|tag| self.with_tag(tag)).collect()
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The effective tag (the default tag for tagless descriptors).
    pub fn tag(&self) -> &str {
        self.metadata.tag()
    }

    /// Whether this descriptor names a tag and can be built.
    pub fn is_concrete(&self) -> bool {
        self.tag.is_some()
    }

    /// The build type.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Group of the current tag.
    pub fn group(&self) -> String {
        self.metadata.group()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn config(&self) -> &Arc<Config> {
        self.workspace.config()
    }

    pub fn is_alias(&self) -> bool {
        self.metadata.is_alias()
    }

    pub fn is_complex_alias(&self) -> bool {
        self.metadata.is_complex_alias()
    }

    /// Descriptor for the tag this one aliases, if it is an alias.
    pub fn aliased_repo(&self) -> Result<Option<Repo>> {
        if !self.is_alias() {
            return Ok(None);
        }
        self.with_tag(&self.metadata.aliased_tag()).map(Some)
    }

    /// `user/name`, without a tag.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.user, self.name)
    }

    /// `user/name:tag`.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository(), self.tag())
    }

    /// Name of the rootfs helper image for this repository.
    pub fn rootfs_image(&self) -> String {
        let prefix = self
            .metadata
            .get_str("local_prefix")
            .unwrap_or_else(|| "local".to_string());
        format!("{}/rootfs:{}", prefix, self.name)
    }

    /// Whether pushing is enabled for this repository.
    pub fn is_pushable(&self) -> bool {
        self.metadata.get_bool("push")
    }

    /// Whether the build context should be cached.
    pub fn is_cacheable(&self) -> bool {
        self.metadata.get_bool("cache")
    }

    // --- Path conventions -------------------------------------------------

    /// Repository root directory.
    pub fn root(&self) -> PathBuf {
        self.workspace.repo_root(&self.name)
    }

    /// The repository's Dockerfile template.
    pub fn dockerfile(&self) -> PathBuf {
        self.root().join("Dockerfile")
    }

    /// The repository's `copy/` root.
    pub fn copy_dir(&self) -> PathBuf {
        self.root().join(self.dir("copy_dir", "copy"))
    }

    /// `copy/tag/<tag>`.
    pub fn copy_tag_dir(&self) -> PathBuf {
        self.copy_dir().join(self.dir("tag_dir", "tag")).join(self.tag())
    }

    /// `copy/type/<group>`.
    pub fn copy_type_dir(&self) -> PathBuf {
        self.copy_dir()
            .join(self.dir("type_dir", "type"))
            .join(self.group())
    }

    /// `copy/all`.
    pub fn copy_all_dir(&self) -> PathBuf {
        self.copy_dir().join(self.dir("all_dir", "all"))
    }

    /// `copy/rootfs`.
    pub fn copy_rootfs_dir(&self) -> PathBuf {
        self.copy_dir().join(self.dir("rootfs_dir", "rootfs"))
    }

    /// Copy root shared by every repository.
    pub fn global_copy_dir(&self) -> Option<PathBuf> {
        self.workspace.global_copy_dir()
    }

    /// Durable cache directory for this tag's context.
    pub fn cache_dir(&self) -> PathBuf {
        self.workspace
            .cache_root()
            .join(&self.name)
            .join(self.tag())
    }

    /// Whether `copy/` exists and is flat (no `tag/`, `type/` or `all/`).
    pub fn is_simple_copy(&self) -> bool {
        let copy = self.copy_dir();
        copy.is_dir()
            && [
                self.dir("tag_dir", "tag"),
                self.dir("type_dir", "type"),
                self.dir("all_dir", "all"),
            ]
            .iter()
            .all(|child| !copy.join(child).exists())
    }

    /// Relative path of the rootfs helper script inside a copy tree.
    pub fn mkimg_path(&self) -> PathBuf {
        PathBuf::from(
            self.metadata
                .get_str("mkimg")
                .unwrap_or_else(|| "usr/local/bin/mkimg".to_string()),
        )
    }

    /// Environment for the rootfs helper container.
    ///
    /// Every resolved top-level scalar or list key becomes an uppercase
    /// variable, entries of `env` are passed through, and the fixed keys
    /// `REPO`, `USER`, `NAME`, `TAG`, `TYPE`, `GROUP`, `TAR_GZ` and
    /// `COPY_DIR` are set last.
    pub fn to_env(&self, tar_gz: Option<&Path>, copy_dir: Option<&Path>) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();

        if let Value::Mapping(resolved) = self.metadata.to_value() {
            for (key, value) in &resolved {
                if key == "env" {
                    continue;
                }
                match value {
                    Value::Nil | Value::Mapping(_) => {}
                    other => {
                        env.insert(env_key(key), other.to_plain_string());
                    }
                }
            }

            match resolved.get("env") {
                Some(Value::Mapping(vars)) => {
                    for (key, value) in vars {
                        env.insert(key.clone(), value.to_plain_string());
                    }
                }
                Some(Value::List(items)) => {
                    for item in items {
                        let item = item.to_plain_string();
                        if let Some((key, value)) = item.split_once('=') {
                            env.insert(key.to_string(), value.to_string());
                        }
                    }
                }
                _ => {}
            }
        }

        env.insert("REPO".to_string(), self.repository());
        env.insert("USER".to_string(), self.user.clone());
        env.insert("NAME".to_string(), self.name.clone());
        env.insert("TAG".to_string(), self.tag().to_string());
        env.insert("TYPE".to_string(), self.kind.clone());
        env.insert("GROUP".to_string(), self.group());
        if let Some(tar_gz) = tar_gz {
            env.insert("TAR_GZ".to_string(), tar_gz.display().to_string());
        }
        if let Some(copy_dir) = copy_dir {
            env.insert("COPY_DIR".to_string(), copy_dir.display().to_string());
        }

        env
    }

    fn dir(&self, key: &str, default: &str) -> String {
        self.metadata
            .get_str(key)
            .unwrap_or_else(|| default.to_string())
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}/{}:{}", self.user, self.name, tag),
            None => write!(f, "{}/{}", self.user, self.name),
        }
    }
}

impl PartialEq for Repo {
    fn eq(&self, other: &Self) -> bool {
        self.user == other.user && self.name == other.name && self.tag == other.tag
    }
}

impl Eq for Repo {}

fn validate_spec(spec: &RepoSpec) -> Result<()> {
    let invalid = || Error::InvalidRepoName {
        name: RepoName {
            user: spec.user.clone(),
            name: spec.name.clone(),
            tag: spec.tag.clone(),
        }
        .to_string(),
    };

    if !RepoName::is_valid_segment(&spec.name) {
        return Err(invalid());
    }
    if spec
        .user
        .as_deref()
        .is_some_and(|u| !RepoName::is_valid_segment(u))
    {
        return Err(invalid());
    }
    if spec.tag.as_deref().is_some_and(|t| !RepoName::is_valid_tag(t)) {
        return Err(invalid());
    }
    Ok(())
}

fn resolve_kind(metadata: &Metadata, explicit: Option<&str>, config: &Config) -> Result<String> {
    let kind = explicit
        .map(str::to_string)
        .or_else(|| metadata.get_str("type"))
        .unwrap_or_else(|| "normal".to_string());

    if !config.is_build_type(&kind) {
        return Err(Error::UnknownBuildType {
            kind,
            allowed: config.build_types().join(", "),
        });
    }
    Ok(kind)
}

fn env_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}
