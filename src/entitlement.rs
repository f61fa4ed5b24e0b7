//! Entitlement store
//!
//! Maps an [`Identity`] to the instant its paid unlock expires. This is the
//! only state shared between the purchase path (webhook writes) and the scan
//! path (quota reads).
//!
//! Writes are unconditional overwrites (last writer wins); a new purchase
//! replaces the previous expiry rather than extending it. Entries are never
//! deleted explicitly: an entry is active iff `expires_at > now`, so expired
//! entries are inert until [`EntitlementStore::sweep`] drops them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::identity::Identity;

/// Key-value abstraction over entitlement storage.
///
/// The default backing is process memory; an external store can implement
/// this trait without changing the quota gate or webhook callers.
#[async_trait::async_trait]
pub trait EntitlementStore: Send + Sync + 'static {
    /// Unconditionally set the unlock expiry for an identity
    async fn set_entitlement(&self, identity: &Identity, until: DateTime<Utc>);

    /// Current recorded expiry, active or not
    async fn expires_at(&self, identity: &Identity) -> Option<DateTime<Utc>>;

    /// Whether the identity holds an unexpired entitlement at `now`
    async fn is_active(&self, identity: &Identity, now: DateTime<Utc>) -> bool {
        self.expires_at(identity)
            .await
            .is_some_and(|expires_at| expires_at > now)
    }

    /// Drop entries that are no longer active at `now`; returns how many were removed
    async fn sweep(&self, now: DateTime<Utc>) -> usize;

    /// Number of tracked entries (including expired ones not yet swept)
    async fn len(&self) -> usize;

    /// Whether the store tracks no entries at all
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Process-memory entitlement store.
///
/// Many concurrent readers, occasional writers. Critical sections never span
/// an `.await`.
#[derive(Debug, Default)]
pub struct InMemoryEntitlementStore {
    entries: RwLock<HashMap<Identity, DateTime<Utc>>>,
}

impl InMemoryEntitlementStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl EntitlementStore for InMemoryEntitlementStore {
    async fn set_entitlement(&self, identity: &Identity, until: DateTime<Utc>) {
        self.entries.write().insert(identity.clone(), until);
    }

    async fn expires_at(&self, identity: &Identity) -> Option<DateTime<Utc>> {
        self.entries.read().get(identity).copied()
    }

    async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Swept expired entitlements");
        }
        removed
    }

    async fn len(&self) -> usize {
        self.entries.read().len()
    }
}
