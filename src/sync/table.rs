//! Bookkeeping for mirrored resources.

use std::collections::HashMap;
use std::future::poll_fn;
use std::task::Poll;

use tokio::time::Instant;

use super::subscription::{SubscriptionEvent, SubscriptionGroup};

/// One mirrored document.
#[derive(Debug)]
pub(crate) struct SyncedResource {
    pub(crate) key: String,
    pub(crate) subscription: SubscriptionGroup,
    pub(crate) last_used_at: Instant,
    /// Latest version the backend was sent.
    pub(crate) mirrored_version: i32,
}

/// Read-only view of a table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedResourceInfo {
    pub key: String,
    pub version: i32,
    pub last_used_at: Instant,
}

/// Mirrored resources keyed by canonical identity. An entry exists iff the
/// backend holds a mirror for its key.
#[derive(Debug, Default)]
pub(crate) struct SyncedResourceTable {
    entries: HashMap<String, SyncedResource>,
}

impl SyncedResourceTable {
    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut SyncedResource> {
        self.entries.get_mut(key)
    }

    pub(crate) fn insert(&mut self, resource: SyncedResource) {
        let previous = self.entries.insert(resource.key.clone(), resource);
        debug_assert!(previous.is_none(), "resource mirrored twice");
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<SyncedResource> {
        self.entries.remove(key)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &SyncedResource> {
        self.entries.values()
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn info(&self) -> Vec<SyncedResourceInfo> {
        let mut info: Vec<_> = self
            .iter()
            .map(|entry| SyncedResourceInfo {
                key: entry.key.clone(),
                version: entry.mirrored_version,
                last_used_at: entry.last_used_at,
            })
            .collect();
        info.sort_by(|a, b| a.key.cmp(&b.key));
        info
    }

    /// Resolves with the next event from any entry's subscription. Pending
    /// forever while the table is empty.
    pub(crate) async fn next_event(&mut self) -> (String, SubscriptionEvent) {
        poll_fn(|cx| {
            for entry in self.entries.values_mut() {
                if let Poll::Ready(event) = entry.subscription.poll_event(cx) {
                    return Poll::Ready((entry.key.clone(), event));
                }
            }
            Poll::Pending
        })
        .await
    }
}
