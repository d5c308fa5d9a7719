//! Process-wide registry of live sessions.
//!
//! Entries hold weak handles only: the registry never keeps a session alive.
//! A session that disappears without unregistering is noticed the next time
//! someone lists targets, and its entry is dropped then.

use crate::engine::SyncSession;
use dashmap::DashMap;
use std::sync::{Arc, OnceLock, Weak};

/// Registry of the sessions that take part in synchronization.
pub type SessionRegistry = Registry<SyncSession>;

/// Concurrent map from session key to a weak handle.
pub struct Registry<T> {
    entries: DashMap<String, Weak<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `key`. A later registration under the
    /// same key replaces the former one (session restart).
    pub fn register(&self, key: &str, instance: &Arc<T>) {
        if self
            .entries
            .insert(key.to_string(), Arc::downgrade(instance))
            .is_some()
        {
            log::debug!("Replaced registry entry {}", key);
        }
    }

    /// Live instances accepted by `predicate`, excluding `exclude_key`.
    ///
    /// Entries whose instance is gone are removed along the way.
    pub fn targets<F>(&self, exclude_key: &str, predicate: F) -> Vec<(String, Arc<T>)>
    where
        F: Fn(&T) -> bool,
    {
        let mut live = Vec::new();
        let mut dead = Vec::new();

        for entry in self.entries.iter() {
            match entry.value().upgrade() {
                Some(instance) => {
                    if entry.key() != exclude_key && predicate(&instance) {
                        live.push((entry.key().clone(), instance));
                    }
                }
                None => dead.push(entry.key().clone()),
            }
        }

        for key in dead {
            // Only drop the entry if it is still dead; a restart may have
            // re-registered the key in the meantime.
            if self
                .entries
                .remove_if(&key, |_, weak| weak.strong_count() == 0)
                .is_some()
            {
                log::debug!("Purged dead registry entry {}", key);
            }
        }

        live
    }

    /// Evict `key`. Returns whether an entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries, dead ones included until they are purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SessionRegistry {
    /// The registry shared by every session in the process.
    pub fn global() -> Arc<SessionRegistry> {
        static GLOBAL: OnceLock<Arc<SessionRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(SessionRegistry::new())).clone()
    }
}
