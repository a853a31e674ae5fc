//! Active connection tracking
//!
//! At most one request per [`ConnectionKey`] may be in flight. Registering a
//! key that is already active cancels the older request first. The returned
//! [`ConnectionGuard`] removes the entry when dropped, but only if the entry
//! still belongs to it, so a superseded request never evicts its successor.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

/// Identity of a logical request: endpoint plus a hash of the payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub endpoint: String,
    pub signature: u64,
}

impl ConnectionKey {
    pub fn new(endpoint: impl Into<String>, signature: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            signature,
        }
    }

    /// Key whose signature is the hash of `payload`
    pub fn for_payload(endpoint: impl Into<String>, payload: &str) -> Self {
        Self::new(endpoint, signature_of(payload))
    }
}

/// Stable-within-process hash of a request payload
pub fn signature_of(payload: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    payload.hash(&mut hasher);
    hasher.finish()
}

struct Entry {
    id: u64,
    cancel: CancellationToken,
}

/// Shared map of in-flight requests
#[derive(Default)]
pub struct ConnectionRegistry {
    active: Mutex<HashMap<ConnectionKey, Entry>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("active", &self.len())
            .finish()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionKey, Entry>> {
        // Entries stay consistent even if a holder panicked
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Track `cancel` under `key`, cancelling any request already holding it
    ///
    /// Check, cancel and insert happen under one lock.
    pub fn register(
        self: &Arc<Self>,
        key: ConnectionKey,
        cancel: CancellationToken,
    ) -> ConnectionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let previous = self.lock().insert(
            key.clone(),
            Entry {
                id,
                cancel: cancel.clone(),
            },
        );
        if let Some(previous) = previous {
            log::debug!(
                "Superseding in-flight request to {} (signature {:x})",
                key.endpoint,
                key.signature
            );
            previous.cancel.cancel();
        }
        ConnectionGuard {
            registry: Arc::clone(self),
            key,
            id,
            cancel,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn is_active(&self, key: &ConnectionKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Cancel the request under `key`; returns whether one was active
    ///
    /// The entry itself is removed when that request's guard drops.
    pub fn cancel(&self, key: &ConnectionKey) -> bool {
        match self.lock().get(key) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight request
    pub fn cancel_all(&self) -> usize {
        let active = self.lock();
        for entry in active.values() {
            entry.cancel.cancel();
        }
        active.len()
    }

    fn release(&self, key: &ConnectionKey, id: u64) {
        let mut active = self.lock();
        if active.get(key).is_some_and(|entry| entry.id == id) {
            active.remove(key);
        }
    }
}

/// Registration handle for one request
///
/// Dropping it removes the registry entry unless a newer request has taken
/// the key over.
pub struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    key: ConnectionKey,
    id: u64,
    cancel: CancellationToken,
}

impl ConnectionGuard {
    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Token that fires when this request is cancelled or superseded
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.release(&self.key, self.id);
    }
}
