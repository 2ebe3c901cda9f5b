//! Typed, live-updating handles onto single configuration keys.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use arc_swap::ArcSwap;

use crate::binding::coerce::{BindingError, FromConfigValue};
use crate::observability::metrics;
use crate::store::{ConfigSnapshot, ConfigStore, SnapshotObserver};

type Listener<T> = Box<dyn Fn(&T) + Send + Sync>;

struct BindingState {
    /// Raw value last observed for the key (`None` = absent).
    raw: Option<String>,
    last_error: Option<BindingError>,
}

struct BindingInner<T> {
    key: String,
    default: T,
    value: ArcSwap<T>,
    state: Mutex<BindingState>,
    listeners: Mutex<Vec<Listener<T>>>,
}

/// A typed view of one key in a [`ConfigStore`].
///
/// The binding registers itself with the store when created and re-derives
/// its value whenever a snapshot changes the key's raw value. Absent keys
/// yield the default; values that fail to coerce are logged, recorded in
/// [`last_error`](Self::last_error), and leave the previous value in place.
///
/// ```
/// use std::collections::BTreeMap;
/// use config_client::binding::PropertyBinding;
/// use config_client::store::{ConfigSnapshot, ConfigStore};
///
/// let store = ConfigStore::default();
/// let port: PropertyBinding<u16> = PropertyBinding::new(&store, "server.port", 8080);
/// assert_eq!(port.get(), 8080);
///
/// let mut values = BTreeMap::new();
/// values.insert("server.port".to_string(), "9090".to_string());
/// store.swap(ConfigSnapshot::new(values, "v1"));
/// assert_eq!(port.get(), 9090);
/// ```
pub struct PropertyBinding<T> {
    inner: Arc<BindingInner<T>>,
}

impl<T> Clone for PropertyBinding<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> PropertyBinding<T>
where
    T: FromConfigValue + Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(store: &ConfigStore, key: impl Into<String>, default: T) -> Self {
        let inner = Arc::new(BindingInner {
            key: key.into(),
            value: ArcSwap::from_pointee(default.clone()),
            default,
            state: Mutex::new(BindingState {
                raw: None,
                last_error: None,
            }),
            listeners: Mutex::new(Vec::new()),
        });

        let observer: Weak<dyn SnapshotObserver> = Arc::downgrade(&inner) as Weak<BindingInner<T>>;
        store.register(observer);

        // The store is read under the state lock: an observer delivery for a
        // newer snapshot waits here and is applied after the initial value.
        {
            let mut state = inner.lock_state();
            let snapshot = store.read();
            inner.apply_locked(&mut state, &snapshot);
        }

        Self { inner }
    }

    /// The current typed value.
    pub fn get(&self) -> T {
        T::clone(&self.inner.value.load())
    }

    /// The current value without cloning it.
    pub fn load(&self) -> Arc<T> {
        self.inner.value.load_full()
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn default_value(&self) -> &T {
        &self.inner.default
    }

    /// The coercion error for the key's current raw value, if it did not bind.
    pub fn last_error(&self) -> Option<BindingError> {
        self.inner.lock_state().last_error.clone()
    }

    /// Call `listener` with the new value each time it changes.
    ///
    /// Listeners run on the task that swapped the snapshot, after the swap.
    /// They must not register further listeners on the same binding.
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }
}

impl<T> BindingInner<T>
where
    T: FromConfigValue + Clone + PartialEq + Send + Sync + 'static,
{
    fn lock_state(&self) -> std::sync::MutexGuard<'_, BindingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, snapshot: &ConfigSnapshot) {
        let next = {
            let mut state = self.lock_state();
            self.apply_locked(&mut state, snapshot)
        };
        let Some(next) = next else {
            return;
        };

        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener(&next);
        }
    }

    /// Re-derive the value from `snapshot`. Returns the new value if it changed.
    fn apply_locked(
        &self,
        state: &mut BindingState,
        snapshot: &ConfigSnapshot,
    ) -> Option<Arc<T>> {
        let raw = snapshot.get(&self.key);
        if state.raw.as_deref() == raw {
            return None;
        }
        state.raw = raw.map(str::to_owned);

        let next = match raw {
            None => self.default.clone(),
            Some(raw) => match T::coerce(&self.key, raw) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(
                        key = %self.key,
                        version = %snapshot.version(),
                        error = %e,
                        "Keeping last valid value"
                    );
                    metrics::record_binding_error(&self.key);
                    state.last_error = Some(e);
                    return None;
                }
            },
        };
        state.last_error = None;

        if **self.value.load() == next {
            return None;
        }
        let next = Arc::new(next);
        self.value.store(next.clone());
        tracing::debug!(key = %self.key, version = %snapshot.version(), "Binding updated");
        Some(next)
    }
}

impl<T> SnapshotObserver for BindingInner<T>
where
    T: FromConfigValue + Clone + PartialEq + Send + Sync + 'static,
{
    fn on_snapshot(&self, _previous: &ConfigSnapshot, current: &ConfigSnapshot) {
        self.apply(current);
    }
}

impl ConfigStore {
    /// Create a [`PropertyBinding`] for `key` on this store.
    pub fn bind<T>(&self, key: impl Into<String>, default: T) -> PropertyBinding<T>
    where
        T: FromConfigValue + Clone + PartialEq + Send + Sync + 'static,
    {
        PropertyBinding::new(self, key, default)
    }
}
