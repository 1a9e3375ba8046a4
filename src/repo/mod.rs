//! Repository descriptors and workspace layout.
//!
//! - [`RepoName`] - the `[user/]name[:tag]` identifier grammar
//! - [`Repo`] - a repository with its resolved metadata
//! - [`Workspace`] - filesystem conventions shared by every repository

pub mod descriptor;
pub mod name;
pub mod paths;

pub use descriptor::{Repo, RepoSpec};
pub use name::RepoName;
pub use paths::Workspace;
