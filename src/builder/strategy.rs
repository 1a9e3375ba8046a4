//! Build strategies and the steps each one defines.

use crate::repo::Repo;
use std::fmt;

/// Context-assembly steps, in the order the pipeline runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    SetupContext,
    CopyGlobal,
    SimpleCopy,
    CopyAll,
    CopyType,
    CopyTag,
    CopyCleanup,
    BuildContext,
    VerifyContext,
    CacheContext,
}

impl Step {
    pub const ORDER: &'static [Step] = &[
        Step::SetupContext,
        Step::CopyGlobal,
        Step::SimpleCopy,
        Step::CopyAll,
        Step::CopyType,
        Step::CopyTag,
        Step::CopyCleanup,
        Step::BuildContext,
        Step::VerifyContext,
        Step::CacheContext,
    ];

    /// Whether this step copies one of the layered `copy/` sub-roots.
    pub fn is_layer(self) -> bool {
        matches!(self, Step::CopyAll | Step::CopyType | Step::CopyTag)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::SetupContext => "setup_context",
            Step::CopyGlobal => "copy_global",
            Step::SimpleCopy => "simple_copy",
            Step::CopyAll => "copy_all",
            Step::CopyType => "copy_type",
            Step::CopyTag => "copy_tag",
            Step::CopyCleanup => "copy_cleanup",
            Step::BuildContext => "build_context",
            Step::VerifyContext => "verify_context",
            Step::CacheContext => "cache_context",
        };
        f.write_str(name)
    }
}

/// How a repository is turned into an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Render the Dockerfile, copy layers, build (`normal`, `simple`).
    Direct,
    /// Build a root filesystem archive in a helper container, then build
    /// `FROM scratch` around it (`scratch`).
    TwoStage,
    /// The helper image a two-stage build runs.
    RootfsHelper,
    /// Re-tag the aliased tag's image.
    Alias,
}

const DIRECT_STEPS: &[Step] = &[
    Step::SetupContext,
    Step::CopyGlobal,
    Step::SimpleCopy,
    Step::CopyAll,
    Step::CopyType,
    Step::CopyTag,
    Step::CacheContext,
];

const TWO_STAGE_STEPS: &[Step] = &[
    Step::SetupContext,
    Step::CopyGlobal,
    Step::SimpleCopy,
    Step::CopyAll,
    Step::CopyType,
    Step::CopyTag,
    Step::CopyCleanup,
    Step::BuildContext,
    Step::VerifyContext,
    Step::CacheContext,
];

const ROOTFS_STEPS: &[Step] = &[Step::SetupContext, Step::SimpleCopy, Step::VerifyContext];

impl StrategyKind {
    /// Strategy for a concrete repository.
    ///
    /// Simple aliases are re-tagged; complex aliases are built like any
    /// other tag of their type.
    pub fn for_repo(repo: &Repo) -> Self {
        if repo.is_alias() && !repo.is_complex_alias() {
            StrategyKind::Alias
        } else if repo.kind() == "scratch" {
            StrategyKind::TwoStage
        } else {
            StrategyKind::Direct
        }
    }

    /// Steps this strategy runs, in pipeline order.
    pub fn steps(self) -> &'static [Step] {
        match self {
            StrategyKind::Direct => DIRECT_STEPS,
            StrategyKind::TwoStage => TWO_STAGE_STEPS,
            StrategyKind::RootfsHelper => ROOTFS_STEPS,
            StrategyKind::Alias => &[],
        }
    }

    /// Whether images built by this strategy may be pushed.
    pub fn is_pushable(self) -> bool {
        !matches!(self, StrategyKind::RootfsHelper)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Direct => "direct",
            StrategyKind::TwoStage => "two-stage",
            StrategyKind::RootfsHelper => "rootfs",
            StrategyKind::Alias => "alias",
        };
        f.write_str(name)
    }
}
