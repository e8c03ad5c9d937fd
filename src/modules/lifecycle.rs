// lifecycle.rs - Pending Lifecycle Flags
// Tracks which signatures are currently inside their loader-driven init or
// unload call. The loader is the only writer; plugins read the flags to make
// sure their hooks are not being invoked out of band.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct PendingFlags {
    initialization: HashMap<String, bool>,
    unload: HashMap<String, bool>,
}

/// Shared handle to the pending-initialization / pending-unload tables.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    flags: Arc<RwLock<PendingFlags>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending_initialization(&self, signature: &str) -> bool {
        let flags = self.flags.read().unwrap_or_else(|e| e.into_inner());
        flags.initialization.get(signature).copied().unwrap_or(false)
    }

    pub fn is_pending_unload(&self, signature: &str) -> bool {
        let flags = self.flags.read().unwrap_or_else(|e| e.into_inner());
        flags.unload.get(signature).copied().unwrap_or(false)
    }

    pub(crate) fn set_pending_initialization(&self, signature: &str, pending: bool) {
        let mut flags = self.flags.write().unwrap_or_else(|e| e.into_inner());
        if pending {
            flags.initialization.insert(signature.to_string(), true);
        } else {
            flags.initialization.remove(signature);
        }
    }

    pub(crate) fn set_pending_unload(&self, signature: &str, pending: bool) {
        let mut flags = self.flags.write().unwrap_or_else(|e| e.into_inner());
        if pending {
            flags.unload.insert(signature.to_string(), true);
        } else {
            flags.unload.remove(signature);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_independent() {
        let lifecycle = Lifecycle::new();
        lifecycle.set_pending_initialization("cog.a", true);

        assert!(lifecycle.is_pending_initialization("cog.a"));
        assert!(!lifecycle.is_pending_unload("cog.a"));
        assert!(!lifecycle.is_pending_initialization("cog.b"));

        lifecycle.set_pending_initialization("cog.a", false);
        assert!(!lifecycle.is_pending_initialization("cog.a"));
    }

    #[test]
    fn test_clones_share_state() {
        let lifecycle = Lifecycle::new();
        let view = lifecycle.clone();
        lifecycle.set_pending_unload("cog.a", true);
        assert!(view.is_pending_unload("cog.a"));
    }
}
