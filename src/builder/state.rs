//! Pipeline lifecycle.

use std::fmt;

/// Lifecycle of one pipeline run.
///
/// `Created → ContextReady → Built → Pushed → Cleaned`, with `Failed`
/// reachable from any state before `Cleaned`. Pushing is optional, so
/// `Built → Cleaned` is also valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Created,
    ContextReady,
    Built,
    Pushed,
    Cleaned,
    Failed,
}

impl BuildState {
    pub fn can_transition_to(self, next: BuildState) -> bool {
        use BuildState::*;
        match (self, next) {
            (Cleaned | Failed, _) => false,
            (_, Failed) => true,
            (Created, ContextReady) => true,
            // Aliases re-tag without a context.
            (Created, Built) => true,
            (ContextReady, Built) => true,
            (Built, Pushed) => true,
            (Built | Pushed, Cleaned) => true,
            _ => false,
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Created => "created",
            BuildState::ContextReady => "context-ready",
            BuildState::Built => "built",
            BuildState::Pushed => "pushed",
            BuildState::Cleaned => "cleaned",
            BuildState::Failed => "failed",
        };
        f.write_str(name)
    }
}
