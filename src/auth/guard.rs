//! In-flight guard for federated sign-in
//!
//! A double-clicked "Continue with Google" must reach the provider once.
//! Each browser control has a key; while an attempt for that key is in
//! flight, further attempts are turned away. The key is released when the
//! `InFlight` token is dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use super::provider::FederatedProvider;

/// Tracks federated attempts that have not resolved yet
#[derive(Debug, Clone, Default)]
pub struct FederatedGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Proof that the holder owns the attempt for `key`
#[derive(Debug)]
pub struct InFlight {
    key: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl FederatedGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key identifying one provider button in one browser
    pub fn control_key(client_id: &str, provider: FederatedProvider) -> String {
        format!("{}:{}", client_id, provider.id())
    }

    /// Claim `key`, or `None` if an attempt for it is already running
    pub fn try_acquire(&self, key: impl Into<String>) -> Option<InFlight> {
        let key = key.into();
        if !lock(&self.in_flight).insert(key.clone()) {
            return None;
        }

        Some(InFlight {
            key,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// True when no attempt is waiting on the provider
    pub fn is_empty(&self) -> bool {
        lock(&self.in_flight).is_empty()
    }

    #[cfg(test)]
    fn is_in_flight(&self, key: &str) -> bool {
        lock(&self.in_flight).contains(key)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.key);
    }
}

// The set is only touched by the short sections above, so a poisoned lock
// still holds a consistent set.
fn lock(set: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
