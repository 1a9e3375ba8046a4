//! Rootfs helper images shared across one invocation.

use crate::engine::{ContainerEngine, ImageId};
use crate::error::Result;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct Entry {
    image: ImageId,
    keep: bool,
}

/// Memo of rootfs helper images, keyed by repository name.
///
/// Scoped to one top-level invocation: [`RootfsCache::teardown`] deletes
/// every helper that was not marked to be kept.
#[derive(Debug, Default)]
pub struct RootfsCache {
    entries: BTreeMap<String, Entry>,
}

impl RootfsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ImageId> {
        self.entries.get(name).map(|e| &e.image)
    }

    pub fn insert(&mut self, name: &str, image: ImageId, keep: bool) {
        self.entries.insert(name.to_string(), Entry { image, keep });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget and delete one helper (unless it is kept).
    pub fn discard(&mut self, name: &str, engine: &dyn ContainerEngine) -> Result<()> {
        let Some(entry) = self.entries.remove(name) else {
            return Ok(());
        };
        if entry.keep {
            debug!("Keeping rootfs image {} for {}", entry.image, name);
            return Ok(());
        }
        info!("Removing rootfs image for {}", name);
        engine.delete_image(&entry.image, true)
    }

    /// Delete every memoized helper that is not kept.
    ///
    /// Failures are logged and the remaining helpers are still removed.
    pub fn teardown(&mut self, engine: &dyn ContainerEngine) {
        let names: Vec<String> = self.entries.keys().cloned().collect();
        for name in names {
            if let Err(e) = self.discard(&name, engine) {
                warn!("Failed to remove rootfs image for {}: {}", name, e);
            }
        }
    }
}
