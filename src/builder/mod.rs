//! Build-context assembly and the build pipeline.
//!
//! - [`pipeline`] - [`Builder`] and the per-repository pipeline
//! - [`strategy`] - [`StrategyKind`] and the steps each strategy defines
//! - [`context`] - transient build context directories
//! - [`copy`] - layered copy of `copy/` trees
//! - [`template`] - Dockerfile template rendering
//! - [`rootfs`] - rootfs helper memo for one invocation
//! - [`cache`] - durable context cache
//! - [`state`] - pipeline lifecycle

pub mod cache;
pub mod context;
pub mod copy;
pub mod pipeline;
pub mod rootfs;
pub mod state;
pub mod strategy;
pub mod template;

pub use cache::CacheRecord;
pub use context::BuildContext;
pub use pipeline::{BuildOutcome, Builder};
pub use rootfs::RootfsCache;
pub use state::BuildState;
pub use strategy::{Step, StrategyKind};
