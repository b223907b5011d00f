//! Observed-state cache.
//!
//! Keeps, per object identity, the last remote state a describe call
//! successfully returned, together with a consecutive-error counter that
//! drives the retry backoff. The reconcilers consult the snapshot to decide
//! whether an object has already converged without re-reading the service,
//! and drop it whenever a call fails with unknown remote effect so the next
//! pass re-observes before mutating anything.
//!
//! One entry per object identity; distinct objects never share state.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Identity of a custom resource: namespace plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    /// Creates a key from a namespace and name pair.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A cached remote observation.
#[derive(Debug, Clone)]
pub struct ObservedEntry<T> {
    /// The remote state as last read
    pub snapshot: T,
    /// When the read happened
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug)]
struct CacheSlot<T> {
    snapshot: Option<ObservedEntry<T>>,
    consecutive_errors: u32,
}

impl<T> Default for CacheSlot<T> {
    fn default() -> Self {
        Self {
            snapshot: None,
            consecutive_errors: 0,
        }
    }
}

/// Per-kind cache of last observed remote state.
#[derive(Debug)]
pub struct ObservedCache<T> {
    slots: Mutex<HashMap<ObjectKey, CacheSlot<T>>>,
}

impl<T> Default for ObservedCache<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> ObservedCache<T> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful observation and clears the error counter.
    pub fn record_observation(&self, key: &ObjectKey, snapshot: T) {
        let mut slots = self.slots.lock().unwrap();
        let slot = slots.entry(key.clone()).or_default();
        slot.snapshot = Some(ObservedEntry {
            snapshot,
            observed_at: Utc::now(),
        });
        slot.consecutive_errors = 0;
    }

    /// Returns the cached observation, if any.
    #[must_use]
    pub fn get(&self, key: &ObjectKey) -> Option<ObservedEntry<T>> {
        self.slots
            .lock()
            .unwrap()
            .get(key)
            .and_then(|slot| slot.snapshot.clone())
    }

    /// Drops the snapshot but keeps the error counter. Used after a call
    /// whose remote effect is unknown: the next pass must re-observe.
    pub fn invalidate(&self, key: &ObjectKey) {
        if let Some(slot) = self.slots.lock().unwrap().get_mut(key) {
            slot.snapshot = None;
        }
    }

    /// Current consecutive-error count for the object.
    #[must_use]
    pub fn error_count(&self, key: &ObjectKey) -> u32 {
        self.slots
            .lock()
            .unwrap()
            .get(key)
            .map_or(0, |slot| slot.consecutive_errors)
    }

    /// Bumps and returns the consecutive-error counter for the object.
    pub fn record_error(&self, key: &ObjectKey) -> u32 {
        let mut slots = self.slots.lock().unwrap();
        let slot = slots.entry(key.clone()).or_default();
        slot.consecutive_errors += 1;
        slot.consecutive_errors
    }

    /// Resets the consecutive-error counter for the object.
    pub fn clear_errors(&self, key: &ObjectKey) {
        if let Some(slot) = self.slots.lock().unwrap().get_mut(key) {
            slot.consecutive_errors = 0;
        }
    }

    /// Removes the object's entry entirely. Called when the custom resource
    /// is finalized.
    pub fn remove(&self, key: &ObjectKey) {
        self.slots.lock().unwrap().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_get() {
        let cache: ObservedCache<String> = ObservedCache::new();
        let key = ObjectKey::new("default", "ws-1");

        assert!(cache.get(&key).is_none());
        cache.record_observation(&key, "snapshot".to_string());
        let entry = cache.get(&key).unwrap();
        assert_eq!(entry.snapshot, "snapshot");
    }

    #[test]
    fn test_error_counter_resets_on_observation() {
        let cache: ObservedCache<String> = ObservedCache::new();
        let key = ObjectKey::new("default", "ws-1");

        assert_eq!(cache.record_error(&key), 1);
        assert_eq!(cache.record_error(&key), 2);
        assert_eq!(cache.record_error(&key), 3);

        cache.record_observation(&key, "recovered".to_string());
        assert_eq!(cache.record_error(&key), 1);
    }

    #[test]
    fn test_invalidate_keeps_error_counter() {
        let cache: ObservedCache<String> = ObservedCache::new();
        let key = ObjectKey::new("default", "ws-1");

        cache.record_observation(&key, "snapshot".to_string());
        let _ = cache.record_error(&key);
        cache.invalidate(&key);

        assert!(cache.get(&key).is_none());
        assert_eq!(cache.record_error(&key), 2);
    }

    #[test]
    fn test_entries_are_isolated_per_identity() {
        let cache: ObservedCache<String> = ObservedCache::new();
        let a = ObjectKey::new("default", "a");
        let b = ObjectKey::new("default", "b");

        cache.record_observation(&a, "a".to_string());
        let _ = cache.record_error(&b);

        cache.remove(&a);
        assert!(cache.get(&a).is_none());
        assert_eq!(cache.record_error(&b), 2);
    }
}
