//! Selected user
//!
//! The selection stores a username, never a record. Every read resolves it
//! against the snapshot that is published at that moment, so a refresh can
//! never leave a stale record behind. A name that disappeared clears the
//! selection.

use std::sync::Arc;

use law_core::{Dynamic, RegistrySnapshot, UserRecord, Username};
use parking_lot::RwLock;

/// At most one user chosen from the current snapshot.
#[derive(Debug, Clone)]
pub struct Selection {
    snapshot: Dynamic<Arc<RegistrySnapshot>>,
    username: Arc<RwLock<Option<Username>>>,
}

impl Selection {
    /// Selection over `snapshot`, initially empty.
    pub fn new(snapshot: Dynamic<Arc<RegistrySnapshot>>) -> Self {
        Self {
            snapshot,
            username: Arc::new(RwLock::new(None)),
        }
    }

    /// Select `username` if the current snapshot contains it.
    ///
    /// An unknown name clears the selection and returns `None`.
    pub fn select(&self, username: &str) -> Option<UserRecord> {
        let record = self.snapshot.get().find_by_username(username).cloned();
        *self.username.write() = record.as_ref().map(|r| r.username.clone());
        record
    }

    /// The selected user as it appears in the current snapshot.
    pub fn selected(&self) -> Option<UserRecord> {
        let mut guard = self.username.write();
        let name = guard.as_ref()?;
        let record = self.snapshot.get().find_by_username(name.as_str()).cloned();
        if record.is_none() {
            *guard = None;
        }
        record
    }

    /// Name of the selected user without resolving it.
    pub fn username(&self) -> Option<Username> {
        self.username.read().clone()
    }

    /// Drop the selection.
    pub fn clear(&self) {
        *self.username.write() = None;
    }
}
