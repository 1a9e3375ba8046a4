//! Error types for Dockwright operations.
//!
//! This module defines [`Error`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Configuration and validation errors are raised while descriptors are
//!   constructed, before any engine call is made
//! - Errors raised mid-pipeline still run cleanup before they propagate
//! - Use `anyhow::Error` (via `Error::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for Dockwright operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Repository identifier does not match `[user/]name[:tag]`.
    #[error("Invalid repository name: {name}")]
    InvalidRepoName { name: String },

    /// Repository type is not one of the configured build types.
    #[error("Unknown build type '{kind}' (expected one of: {allowed})")]
    UnknownBuildType { kind: String, allowed: String },

    /// Repository root directory does not exist.
    #[error("Repository '{name}' not found at {path}")]
    RepoNotFound { name: String, path: PathBuf },

    /// A nested metadata node was created without a root to resolve against.
    #[error("Metadata node for '{key}' has no root metadata")]
    MissingRootMetadata { key: String },

    /// The active strategy has no way to materialize a build context.
    #[error("No context setup defined for {strategy} builds of {repo}")]
    NoSetupContext { strategy: String, repo: String },

    /// The rootfs helper script is missing from the assembled context.
    #[error("Rootfs helper script missing for {repo}: expected {path}")]
    NoRootfsMkimg { repo: String, path: PathBuf },

    /// The repository has no rootfs copy directory.
    #[error("Rootfs copy directory missing for {repo}: expected {path}")]
    NoRootfsCopyDir { repo: String, path: PathBuf },

    /// The rootfs helper produced an empty archive.
    #[error("Rootfs archive is empty for {repo}: {path}")]
    InvalidTargzFile { repo: String, path: PathBuf },

    /// The rootfs helper container exited non-zero.
    #[error("Rootfs helper for {repo} exited with status {status}")]
    BadExitStatus { repo: String, status: i64 },

    /// Failed to parse a configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// A configuration file parsed to something other than a mapping.
    #[error("Invalid configuration at {path}: expected a mapping")]
    ConfigNotMapping { path: PathBuf },

    /// A hook was registered against a point that was never declared.
    #[error("Unknown hook point: {subsystem}/{stage}")]
    UnknownHookPoint { subsystem: String, stage: String },

    /// The repository has no Dockerfile to render.
    #[error("Dockerfile not found for {repo}: {path}")]
    MissingDockerfile { repo: String, path: PathBuf },

    /// A template placeholder could not be rendered.
    #[error("Template error in {template}: {message}")]
    TemplateError { template: String, message: String },

    /// A container engine operation failed.
    #[error("Engine {operation} failed: {message}")]
    EngineFailed { operation: String, message: String },

    /// The build was interrupted by the user.
    #[error("Interrupted")]
    Interrupted,

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Build an [`Error::EngineFailed`] for the given operation.
    pub fn engine(operation: &str, message: impl Into<String>) -> Self {
        Error::EngineFailed {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Exit code the CLI should use when this error ends the process.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Interrupted => 130,
            _ => 1,
        }
    }
}

/// Result type alias for Dockwright operations.
pub type Result<T> = std::result::Result<T, Error>;
