//! Named locks — at most one reindex run per marketplace address.
//!
//! Acquisition never waits: a second caller gets `None` and is expected to
//! drop its request. The returned [`ReindexGuard`] releases the name when it
//! goes out of scope, including on early return and panic unwinding.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

/// Registry of held locks, keyed by name. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct ReindexLocks {
    held: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl ReindexLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        // the map stays consistent across a panic, so a poisoned lock is still usable
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the lock for `name`, or `None` if it is already held.
    pub fn try_acquire(&self, name: &str) -> Option<ReindexGuard> {
        let mut held = self.held();
        if held.contains_key(name) {
            return None;
        }
        let acquired_at = Utc::now();
        held.insert(name.to_string(), acquired_at);
        Some(ReindexGuard {
            locks: self.clone(),
            name: name.to_string(),
            acquired_at,
        })
    }

    pub fn is_locked(&self, name: &str) -> bool {
        self.held().contains_key(name)
    }

    /// When the lock for `name` was taken, if held.
    pub fn acquired_at(&self, name: &str) -> Option<DateTime<Utc>> {
        self.held().get(name).copied()
    }

    /// Names currently held, sorted.
    pub fn held_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.held().keys().cloned().collect();
        names.sort();
        names
    }

    fn release(&self, name: &str) {
        self.held().remove(name);
    }
}

/// Holds one named lock until dropped.
#[derive(Debug)]
pub struct ReindexGuard {
    locks: ReindexLocks,
    name: String,
    acquired_at: DateTime<Utc>,
}

impl ReindexGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }
}

impl Drop for ReindexGuard {
    fn drop(&mut self) {
        self.locks.release(&self.name);
        tracing::trace!(name = %self.name, "reindex lock released");
    }
}
