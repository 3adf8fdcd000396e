//! New-snapshot listeners
//!
//! Listeners are registered by identity (`Arc` address). Adding the same
//! listener twice keeps one registration; removing it prevents every
//! notification for commits that land afterwards. A notification already
//! being delivered when the listener is removed is not recalled.

use std::sync::Arc;

use crate::persisted::PersistedSnapshot;

/// Callback invoked once per newly committed snapshot
pub trait PersistedSnapshotListener: Send + Sync {
    /// Called after `snapshot` became the store's latest snapshot
    fn on_new_snapshot(&self, snapshot: &PersistedSnapshot);
}

impl<F> PersistedSnapshotListener for F
where
    F: Fn(&PersistedSnapshot) + Send + Sync,
{
    fn on_new_snapshot(&self, snapshot: &PersistedSnapshot) {
        self(snapshot)
    }
}

/// Shared listener handle
pub type ListenerRef = Arc<dyn PersistedSnapshotListener>;

fn identity(listener: &ListenerRef) -> *const () {
    Arc::as_ptr(listener) as *const ()
}

/// Listeners in registration order
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<ListenerRef>,
}

impl ListenerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; returns false if it was already registered
    pub fn add(&mut self, listener: ListenerRef) -> bool {
        if self.contains(&listener) {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    /// Unregister a listener; returns false if it was not registered
    pub fn remove(&mut self, listener: &ListenerRef) -> bool {
        let key = identity(listener);
        let before = self.listeners.len();
        self.listeners.retain(|l| identity(l) != key);
        self.listeners.len() != before
    }

    /// Whether `listener` is registered
    pub fn contains(&self, listener: &ListenerRef) -> bool {
        let key = identity(listener);
        self.listeners.iter().any(|l| identity(l) == key)
    }

    /// Copy of the current registrations, for delivery outside any lock
    pub fn registered(&self) -> Vec<ListenerRef> {
        self.listeners.clone()
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
