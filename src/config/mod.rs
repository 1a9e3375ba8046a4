//! Process-wide configuration for Dockwright.
//!
//! - Embedded defaults and override discovery in [`store`]
//! - Deep merging in [`merger`]
//!
//! # Example
//!
//! ```
//! use dockwright::config::Config;
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! fs::write(temp.path().join("opts.yml"), "user: acme").unwrap();
//!
//! let config = Config::load(temp.path()).unwrap();
//! assert_eq!(config.get_str("user"), Some("acme"));
//! assert_eq!(config.get_str("tag"), Some("latest"));
//! ```
//!
//! # Configuration File Locations
//!
//! The first of these found in the working directory is merged over the
//! defaults:
//! 1. `opts.yml`
//! 2. `opts.yaml`
//! 3. `opts.json`
//! 4. `docker/template.yml`
//! 5. `docker/template.json`
//!
//! Each repository may carry its own file with the same names at its root.

pub mod merger;
pub mod store;

pub use merger::deep_merge;
pub use store::{find_override_file, load_override_file, Config, CONFIG_FILES};
