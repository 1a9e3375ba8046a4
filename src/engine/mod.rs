//! Container engine capability.
//!
//! The pipeline drives every image and container operation through the
//! [`ContainerEngine`] trait:
//!
//! - [`docker::DockerCli`] - shells out to a Docker-compatible CLI
//! - [`mock::MockEngine`] - records calls and returns scripted results

pub mod auth;
pub mod docker;
pub mod mock;
pub mod progress;
pub mod runner;

pub use auth::{docker_config_path, load_credentials, registry_for, Credentials, DOCKER_HUB};
pub use docker::DockerCli;
pub use mock::{EngineCall, MockEngine};
pub use progress::{parse_line, ProgressEvent};
pub use runner::{CommandOptions, CommandResult, CommandRunner, OutputLine, SystemRunner};

use crate::error::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Handle to a built image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageId(pub String);

impl ImageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a created container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An image build from a context directory containing a `Dockerfile`.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub context: PathBuf,
}

/// A container to create.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: ImageId,
    pub env: BTreeMap<String, String>,
    /// Host paths bind-mounted at the same path inside the container.
    pub mounts: Vec<PathBuf>,
}

/// Receives progress events while an operation runs.
pub type ProgressSink<'a> = &'a dyn Fn(&ProgressEvent);

/// Operations the build pipeline needs from a container engine.
///
/// Every call blocks until the engine finishes. Failures are reported as
/// [`crate::Error::EngineFailed`].
pub trait ContainerEngine {
    /// Build an image from a context directory.
    fn build_image(&self, request: &BuildRequest, progress: ProgressSink<'_>) -> Result<ImageId>;

    /// Tag `image` as `repository:tag`. With `force`, an existing tag moves.
    fn tag_image(&self, image: &ImageId, repository: &str, tag: &str, force: bool) -> Result<()>;

    /// Push `repository:tag` to its registry.
    fn push_image(&self, reference: &str, progress: ProgressSink<'_>) -> Result<()>;

    fn delete_image(&self, image: &ImageId, force: bool) -> Result<()>;

    /// Look up a local image by reference.
    fn find_image(&self, reference: &str) -> Result<Option<ImageId>>;

    fn login(&self, credentials: &Credentials) -> Result<()>;

    fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId>;

    fn start_container(&self, id: &ContainerId) -> Result<()>;

    /// Stream container output until it exits.
    fn follow_logs(&self, id: &ContainerId, progress: ProgressSink<'_>) -> Result<()>;

    /// Wait for the container to exit and return its status code.
    fn wait_container(&self, id: &ContainerId) -> Result<i64>;

    fn stop_container(&self, id: &ContainerId) -> Result<()>;

    fn delete_container(&self, id: &ContainerId, force: bool) -> Result<()>;
}
