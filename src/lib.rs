//! Dockwright - build container images from a tree of templates.
//!
//! A workspace holds one directory per repository. Each repository has a
//! `Dockerfile`, layered `copy/` trees and YAML metadata that resolves per
//! tag. Dockwright assembles a build context for every tag, drives it
//! through a container engine and cleans up after itself.
//!
//! # Modules
//!
//! - [`builder`] - Build context assembly and the build pipeline
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Process-wide configuration store
//! - [`engine`] - Container engine capability and the Docker CLI client
//! - [`error`] - Error types and result aliases
//! - [`hooks`] - Named extension points run by the pipeline
//! - [`metadata`] - Tag-aware metadata resolution
//! - [`repo`] - Repository identifiers, descriptors and path conventions
//! - [`ui`] - Spinners and terminal output
//!
//! # Example
//!
//! ```
//! use dockwright::metadata::{Metadata, Value};
//!
//! let data: serde_yaml::Value = serde_yaml::from_str(
//!     "tags: { latest: {}, '1.0': {} }\nenv: { tag: { '1.0': [LEGACY=1] }, all: [LANG=C] }",
//! )
//! .unwrap();
//! let metadata = Metadata::root(Value::from(data), "1.0");
//! assert_eq!(metadata.get("env").to_plain_string(), "LANG=C LEGACY=1");
//! ```

pub mod builder;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod metadata;
pub mod repo;
pub mod ui;

pub use error::{Error, Result};
