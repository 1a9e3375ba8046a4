//! Mock container engine for testing.
//!
//! `MockEngine` implements [`ContainerEngine`] without a container runtime.
//! It records every call for later assertion and can be scripted with
//! existing images, helper exit codes, archive contents and failures.
//!
//! Builds snapshot the context directory at the time of the call, so tests
//! can inspect the rendered `Dockerfile` and copied files after the
//! pipeline has cleaned the context up.
//!
//! # Example
//!
//! ```
//! use dockwright::engine::{ContainerEngine, MockEngine};
//!
//! let engine = MockEngine::new().with_image("acme/demo:latest", "sha256:1");
//! assert!(engine.find_image("acme/demo:latest").unwrap().is_some());
//! ```

use super::{
    BuildRequest, ContainerEngine, ContainerId, ContainerSpec, Credentials, ImageId, ProgressEvent,
    ProgressSink,
};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Build {
        context: PathBuf,
        /// Dockerfile contents at build time.
        dockerfile: String,
        /// Context files (relative, `/`-separated) and their contents.
        files: BTreeMap<String, String>,
    },
    Tag {
        image: ImageId,
        repository: String,
        tag: String,
        force: bool,
    },
    Push {
        reference: String,
    },
    DeleteImage {
        image: ImageId,
        force: bool,
    },
    FindImage {
        reference: String,
    },
    Login {
        server: String,
        username: String,
    },
    CreateContainer {
        image: ImageId,
        env: BTreeMap<String, String>,
        mounts: Vec<PathBuf>,
        /// Files under the `COPY_DIR` env path at creation time.
        copied: BTreeMap<String, String>,
    },
    StartContainer {
        id: ContainerId,
    },
    FollowLogs {
        id: ContainerId,
    },
    WaitContainer {
        id: ContainerId,
    },
    StopContainer {
        id: ContainerId,
    },
    DeleteContainer {
        id: ContainerId,
        force: bool,
    },
}

impl EngineCall {
    /// Operation name, as used by [`MockEngine::fail_on`].
    pub fn name(&self) -> &'static str {
        match self {
            EngineCall::Build { .. } => "build",
            EngineCall::Tag { .. } => "tag",
            EngineCall::Push { .. } => "push",
            EngineCall::DeleteImage { .. } => "rmi",
            EngineCall::FindImage { .. } => "inspect",
            EngineCall::Login { .. } => "login",
            EngineCall::CreateContainer { .. } => "create",
            EngineCall::StartContainer { .. } => "start",
            EngineCall::FollowLogs { .. } => "logs",
            EngineCall::WaitContainer { .. } => "wait",
            EngineCall::StopContainer { .. } => "stop",
            EngineCall::DeleteContainer { .. } => "rm",
        }
    }
}

#[derive(Debug)]
struct MockState {
    calls: Vec<EngineCall>,
    next_id: u64,
    images: BTreeMap<String, ImageId>,
    containers: BTreeMap<String, ContainerSpec>,
    exit_code: i64,
    archive: Vec<u8>,
    log_lines: Vec<String>,
    failures: BTreeSet<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            next_id: 1,
            images: BTreeMap::new(),
            containers: BTreeMap::new(),
            exit_code: 0,
            archive: b"mock rootfs archive".to_vec(),
            log_lines: Vec::new(),
            failures: BTreeSet::new(),
        }
    }
}

/// Recording container engine.
#[derive(Debug, Default)]
pub struct MockEngine {
    state: Mutex<MockState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing local image.
    pub fn with_image(self, reference: &str, id: &str) -> Self {
        self.state()
            .images
            .insert(reference.to_string(), ImageId(id.to_string()));
        self
    }

    /// Exit code reported by every helper container.
    pub fn with_exit_code(self, code: i64) -> Self {
        self.state().exit_code = code;
        self
    }

    /// Bytes a started container writes to the path in its `TAR_GZ` env.
    pub fn with_archive(self, bytes: &[u8]) -> Self {
        self.state().archive = bytes.to_vec();
        self
    }

    /// Lines emitted by `follow_logs`.
    pub fn with_logs(self, lines: &[&str]) -> Self {
        self.state().log_lines = lines.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Make the named operation fail (after it is recorded).
    pub fn fail_on(self, operation: &str) -> Self {
        self.state().failures.insert(operation.to_string());
        self
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state().calls.clone()
    }

    /// Names of all recorded calls, in order.
    pub fn call_names(&self) -> Vec<&'static str> {
        self.state().calls.iter().map(EngineCall::name).collect()
    }

    /// Recorded builds.
    pub fn builds(&self) -> Vec<EngineCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, EngineCall::Build { .. }))
            .collect()
    }

    /// `repository:tag` of every recorded tag call.
    pub fn tagged(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Tag {
                    repository, tag, ..
                } => Some(format!("{repository}:{tag}")),
                _ => None,
            })
            .collect()
    }

    /// References of every recorded push.
    pub fn pushed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Push { reference } => Some(reference),
                _ => None,
            })
            .collect()
    }

    /// Images deleted so far.
    pub fn deleted_images(&self) -> Vec<ImageId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::DeleteImage { image, .. } => Some(image),
                _ => None,
            })
            .collect()
    }

    /// Containers deleted so far.
    pub fn deleted_containers(&self) -> Vec<ContainerId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::DeleteContainer { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: EngineCall) -> Result<()> {
        let mut state = self.state();
        let name = call.name();
        state.calls.push(call);
        if state.failures.contains(name) {
            return Err(Error::engine(name, "scripted failure"));
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state();
        let id = format!("{prefix}{}", state.next_id);
        state.next_id += 1;
        id
    }
}

fn snapshot(root: &Path) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    if root.is_dir() {
        walk(root, root, &mut files)?;
    }
    Ok(files)
}

fn walk(root: &Path, dir: &Path, files: &mut BTreeMap<String, String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(root, &path, files)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .map(|p| {
                    p.components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/")
                })
                .unwrap_or_default();
            let content = String::from_utf8_lossy(&fs::read(&path)?).into_owned();
            files.insert(relative, content);
        }
    }
    Ok(())
}

impl ContainerEngine for MockEngine {
    fn build_image(&self, request: &BuildRequest, progress: ProgressSink<'_>) -> Result<ImageId> {
        let mut files = snapshot(&request.context)?;
        let dockerfile = files.remove("Dockerfile").unwrap_or_default();
        self.record(EngineCall::Build {
            context: request.context.clone(),
            dockerfile,
            files,
        })?;
        progress(&ProgressEvent::Stream("Successfully built\n".to_string()));
        Ok(ImageId(self.next_id("sha256:mock")))
    }

    fn tag_image(&self, image: &ImageId, repository: &str, tag: &str, force: bool) -> Result<()> {
        self.record(EngineCall::Tag {
            image: image.clone(),
            repository: repository.to_string(),
            tag: tag.to_string(),
            force,
        })?;
        self.state()
            .images
            .insert(format!("{repository}:{tag}"), image.clone());
        Ok(())
    }

    fn push_image(&self, reference: &str, progress: ProgressSink<'_>) -> Result<()> {
        self.record(EngineCall::Push {
            reference: reference.to_string(),
        })?;
        progress(&ProgressEvent::Status {
            id: None,
            status: format!("Pushed {reference}"),
            progress: None,
        });
        Ok(())
    }

    fn delete_image(&self, image: &ImageId, force: bool) -> Result<()> {
        self.record(EngineCall::DeleteImage {
            image: image.clone(),
            force,
        })?;
        self.state().images.retain(|_, id| id != image);
        Ok(())
    }

    fn find_image(&self, reference: &str) -> Result<Option<ImageId>> {
        self.record(EngineCall::FindImage {
            reference: reference.to_string(),
        })?;
        Ok(self.state().images.get(reference).cloned())
    }

    fn login(&self, credentials: &Credentials) -> Result<()> {
        self.record(EngineCall::Login {
            server: credentials.server.clone(),
            username: credentials.username.clone(),
        })
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        let copied = match spec.env.get("COPY_DIR") {
            Some(dir) => snapshot(Path::new(dir))?,
            None => BTreeMap::new(),
        };
        self.record(EngineCall::CreateContainer {
            image: spec.image.clone(),
            env: spec.env.clone(),
            mounts: spec.mounts.clone(),
            copied,
        })?;
        let id = self.next_id("container");
        self.state().containers.insert(id.clone(), spec.clone());
        Ok(ContainerId(id))
    }

    fn start_container(&self, id: &ContainerId) -> Result<()> {
        self.record(EngineCall::StartContainer { id: id.clone() })?;
        let state = self.state();
        let target = state
            .containers
            .get(id.as_str())
            .and_then(|spec| spec.env.get("TAR_GZ"))
            .map(PathBuf::from);
        if let Some(path) = target {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &state.archive)?;
        }
        Ok(())
    }

    fn follow_logs(&self, id: &ContainerId, progress: ProgressSink<'_>) -> Result<()> {
        self.record(EngineCall::FollowLogs { id: id.clone() })?;
        let lines = self.state().log_lines.clone();
        for line in lines {
            progress(&ProgressEvent::Plain(line));
        }
        Ok(())
    }

    fn wait_container(&self, id: &ContainerId) -> Result<i64> {
        self.record(EngineCall::WaitContainer { id: id.clone() })?;
        Ok(self.state().exit_code)
    }

    fn stop_container(&self, id: &ContainerId) -> Result<()> {
        self.record(EngineCall::StopContainer { id: id.clone() })
    }

    fn delete_container(&self, id: &ContainerId, force: bool) -> Result<()> {
        self.record(EngineCall::DeleteContainer {
            id: id.clone(),
            force,
        })?;
        self.state().containers.remove(id.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn build_snapshots_context() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Dockerfile"), "FROM alpine\n").unwrap();
        fs::create_dir_all(temp.path().join("copy/etc")).unwrap();
        fs::write(temp.path().join("copy/etc/motd"), "hi").unwrap();

        let engine = MockEngine::new();
        let id = engine
            .build_image(
                &BuildRequest {
                    context: temp.path().to_path_buf(),
                },
                &|_| {},
            )
            .unwrap();

        assert_eq!(id, ImageId("sha256:mock1".into()));
        match &engine.builds()[0] {
            EngineCall::Build {
                dockerfile, files, ..
            } => {
                assert_eq!(dockerfile, "FROM alpine\n");
                assert_eq!(files["copy/etc/motd"], "hi");
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn tags_are_findable_until_deleted() {
        let engine = MockEngine::new();
        let image = ImageId("sha256:abc".into());
        engine.tag_image(&image, "acme/demo", "latest", true).unwrap();

        assert_eq!(engine.find_image("acme/demo:latest").unwrap(), Some(image.clone()));
        engine.delete_image(&image, true).unwrap();
        assert_eq!(engine.find_image("acme/demo:latest").unwrap(), None);
    }

    #[test]
    fn started_container_writes_archive() {
        let temp = TempDir::new().unwrap();
        let tar = temp.path().join("rootfs.tar.gz");
        let engine = MockEngine::new().with_archive(b"data");

        let mut env = BTreeMap::new();
        env.insert("TAR_GZ".to_string(), tar.display().to_string());
        let id = engine
            .create_container(&ContainerSpec {
                image: ImageId("img".into()),
                env,
                mounts: vec![],
            })
            .unwrap();
        engine.start_container(&id).unwrap();

        assert_eq!(fs::read(&tar).unwrap(), b"data");
    }

    #[test]
    fn scripted_failure_is_recorded_then_raised() {
        let engine = MockEngine::new().fail_on("push");
        let err = engine.push_image("acme/demo:latest", &|_| {}).unwrap_err();

        assert!(matches!(err, Error::EngineFailed { .. }));
        assert_eq!(engine.call_names(), vec!["push"]);
    }
}
