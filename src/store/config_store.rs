//! The shared, atomically swapped configuration store.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use arc_swap::ArcSwap;

use crate::observability::metrics;
use crate::store::snapshot::ConfigSnapshot;

/// Receives every snapshot whose values differ from the previous one.
///
/// Observers run on the swapping task after the new snapshot is visible to
/// readers. They must not call [`ConfigStore::swap`].
pub trait SnapshotObserver: Send + Sync {
    fn on_snapshot(&self, previous: &ConfigSnapshot, current: &ConfigSnapshot);
}

/// Result of a [`ConfigStore::swap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// Values changed; observers were notified.
    Applied { changed_keys: Vec<String> },
    /// Same values under a new version marker; installed without notification.
    VersionOnly,
    /// Identical snapshot; nothing happened.
    Unchanged,
}

/// Holds exactly one [`ConfigSnapshot`] at a time.
///
/// Reads are lock-free loads; swaps are serialized by a mutex so at most one
/// swap is ever in flight.
pub struct ConfigStore {
    current: ArcSwap<ConfigSnapshot>,
    swap_lock: Mutex<()>,
    observers: Mutex<Vec<Weak<dyn SnapshotObserver>>>,
}

impl ConfigStore {
    pub fn new(initial: ConfigSnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            swap_lock: Mutex::new(()),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// The currently installed snapshot.
    pub fn read(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    /// Shortcut for reading a single key from the current snapshot.
    pub fn get(&self, key: &str) -> Option<String> {
        self.current.load().get(key).map(str::to_owned)
    }

    pub fn version(&self) -> String {
        self.current.load().version().to_owned()
    }

    /// Atomically install `next` and notify observers if its values differ.
    pub fn swap(&self, next: ConfigSnapshot) -> SwapOutcome {
        let _guard = self.swap_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = self.current.load_full();

        if previous.same_content(&next) {
            if previous.version() == next.version() {
                return SwapOutcome::Unchanged;
            }
            self.current.store(Arc::new(next));
            return SwapOutcome::VersionOnly;
        }

        let changed_keys = next.changed_keys(&previous);
        let next = Arc::new(next);
        self.current.store(next.clone());
        metrics::record_snapshot_swap(next.len());

        tracing::info!(
            previous_version = %previous.version(),
            version = %next.version(),
            changed = ?changed_keys,
            "Installed configuration snapshot"
        );

        for observer in self.live_observers() {
            observer.on_snapshot(&previous, &next);
        }

        SwapOutcome::Applied { changed_keys }
    }

    /// Register an observer. It is held weakly and pruned once dropped.
    pub fn register(&self, observer: Weak<dyn SnapshotObserver>) {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        observers.retain(|o| o.strong_count() > 0);
        observers.push(observer);
    }

    /// Number of registered observers that are still alive.
    pub fn observer_count(&self) -> usize {
        let observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        observers.iter().filter(|o| o.strong_count() > 0).count()
    }

    fn live_observers(&self) -> Vec<Arc<dyn SnapshotObserver>> {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        observers.retain(|o| o.strong_count() > 0);
        observers.iter().filter_map(Weak::upgrade).collect()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(ConfigSnapshot::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    impl SnapshotObserver for Counter {
        fn on_snapshot(&self, _previous: &ConfigSnapshot, _current: &ConfigSnapshot) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn snapshot(message: &str, version: &str) -> ConfigSnapshot {
        let mut values = BTreeMap::new();
        values.insert("message".to_string(), message.to_string());
        ConfigSnapshot::new(values, version)
    }

    #[test]
    fn test_swap_notifies_once_per_change() {
        let store = ConfigStore::default();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let weak: Weak<dyn SnapshotObserver> = Arc::downgrade(&counter) as Weak<Counter>;
        store.register(weak);

        let outcome = store.swap(snapshot("hello", "v1"));
        assert_eq!(
            outcome,
            SwapOutcome::Applied {
                changed_keys: vec!["message".to_string()]
            }
        );
        assert_eq!(store.get("message").as_deref(), Some("hello"));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        // Identical snapshot: no notification.
        assert_eq!(store.swap(snapshot("hello", "v1")), SwapOutcome::Unchanged);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_version_only_swap_is_silent() {
        let store = ConfigStore::new(snapshot("hello", "v1"));
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        store.register(Arc::downgrade(&counter) as Weak<dyn SnapshotObserver>);

        assert_eq!(store.swap(snapshot("hello", "v2")), SwapOutcome::VersionOnly);
        assert_eq!(store.version(), "v2");
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dropped_observers_are_pruned() {
        let store = ConfigStore::default();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        store.register(Arc::downgrade(&counter) as Weak<dyn SnapshotObserver>);
        assert_eq!(store.observer_count(), 1);

        drop(counter);
        assert_eq!(store.observer_count(), 0);
        store.swap(snapshot("hello", "v1"));
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let store = Arc::new(ConfigStore::default());

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    let mut values = BTreeMap::new();
                    values.insert("a".to_string(), i.to_string());
                    values.insert("b".to_string(), i.to_string());
                    store.swap(ConfigSnapshot::new(values, format!("v{i}")));
                }
            })
        };

        for _ in 0..2000 {
            let snap = store.read();
            assert_eq!(snap.get("a"), snap.get("b"));
        }
        writer.join().unwrap();
    }
}
