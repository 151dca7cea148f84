//! Dynamic<T> - an observable value with version tracking
//!
//! The published registry snapshot, the operation log and anything else a
//! View Projection renders lives in a `Dynamic`. Writers replace the value as
//! a whole; readers either clone the current value or hold a
//! [`Subscription`] and poll for changes.
//!
//! Only `parking_lot` primitives are used so the cell works with any async
//! runtime. Locks are never held across an `.await`.

use std::sync::Arc;

use parking_lot::RwLock;

struct Versioned<T> {
    value: T,
    version: u64,
}

/// A reactive value that can be observed for changes.
///
/// Cloning a `Dynamic` yields another handle to the same cell.
///
/// ```rust,ignore
/// let counter = Dynamic::new(0);
/// let mut sub = counter.subscribe();
///
/// counter.set(1);
/// assert_eq!(sub.poll(), Some(1));
/// assert_eq!(sub.poll(), None);
/// ```
pub struct Dynamic<T> {
    inner: Arc<RwLock<Versioned<T>>>,
}

impl<T> Clone for Dynamic<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Dynamic<T> {
    /// Create a new Dynamic at version 0.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Versioned { value, version: 0 })),
        }
    }

    /// Clone of the current value.
    pub fn get(&self) -> T {
        self.inner.read().value.clone()
    }

    /// Current value together with the version it was published at.
    pub fn get_versioned(&self) -> (T, u64) {
        let guard = self.inner.read();
        (guard.value.clone(), guard.version)
    }

    /// Number of times the value has been replaced.
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Replace the value and return the new version.
    pub fn set(&self, value: T) -> u64 {
        let mut guard = self.inner.write();
        guard.value = value;
        guard.version += 1;
        guard.version
    }

    /// Read-modify-write under a single write lock. Returns the new version.
    pub fn update<F>(&self, f: F) -> u64
    where
        F: FnOnce(&mut T),
    {
        let mut guard = self.inner.write();
        f(&mut guard.value);
        guard.version += 1;
        guard.version
    }

    /// Read-modify-write that only counts as a change when `f` returns
    /// `true`. Returns the new version, or `None` if nothing changed.
    pub fn update_if<F>(&self, f: F) -> Option<u64>
    where
        F: FnOnce(&mut T) -> bool,
    {
        let mut guard = self.inner.write();
        if !f(&mut guard.value) {
            return None;
        }
        guard.version += 1;
        Some(guard.version)
    }

    /// Subscribe to future changes.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            source: self.clone(),
            last_version: self.version(),
        }
    }
}

impl<T: Clone + Send + Sync + Default + 'static> Default for Dynamic<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for Dynamic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (value, version) = self.get_versioned();
        f.debug_struct("Dynamic")
            .field("value", &value)
            .field("version", &version)
            .finish()
    }
}

/// Poll-based subscription to a [`Dynamic`].
pub struct Subscription<T> {
    source: Dynamic<T>,
    last_version: u64,
}

impl<T: Clone + Send + Sync + 'static> Subscription<T> {
    /// Return the latest value if it changed since the last poll.
    ///
    /// Intermediate values published between two polls are skipped.
    pub fn poll(&mut self) -> Option<T> {
        let (value, version) = self.source.get_versioned();
        if version == self.last_version {
            return None;
        }
        self.last_version = version;
        Some(value)
    }

    /// Whether a newer value is available, without consuming it.
    pub fn has_changed(&self) -> bool {
        self.source.version() != self.last_version
    }

    /// Current value, regardless of change state.
    pub fn current(&self) -> T {
        self.source.get()
    }

    /// Version observed by the last successful poll.
    pub fn last_version(&self) -> u64 {
        self.last_version
    }
}
