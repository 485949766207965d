// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Listener registry with copy-on-write snapshots.
//!
//! Subscribing or unsubscribing swaps in a new list; dispatch iterates the
//! snapshot it loaded. A listener added during a dispatch first sees the
//! next event, and a listener removed during a dispatch still sees the
//! current one. No callback is skipped or run twice.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use civica_core::{ChannelEvent, EventKind};

/// Callback invoked for each matching event, on the channel's receive task.
pub type Listener = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry {
    id: ListenerId,
    kind: EventKind,
    listener: Listener,
}

pub struct ListenerRegistry {
    entries: ArcSwap<Vec<Arc<Entry>>>,
    next_id: AtomicU64,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(Entry { id, kind, listener });
        self.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&entry));
            next
        });
        id
    }

    /// Removes exactly one listener. Returns `false` if it was already gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        let previous = self.entries.rcu(|current| {
            current
                .iter()
                .filter(|entry| entry.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|entry| entry.id == id)
    }

    /// Runs every listener registered for the event's kind. Returns how many ran.
    pub fn dispatch(&self, event: &ChannelEvent) -> usize {
        let kind = event.kind();
        let snapshot = self.entries.load_full();
        let mut delivered = 0;
        for entry in snapshot.iter().filter(|entry| entry.kind == kind) {
            (entry.listener)(event);
            delivered += 1;
        }
        delivered
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.entries
            .load()
            .iter()
            .filter(|entry| entry.kind == kind)
            .count()
    }
}

/// Handle returned by `subscribe`; removes exactly its own listener.
#[must_use = "dropping a Subscription keeps the listener registered; call unsubscribe() to remove it"]
pub struct Subscription {
    id: ListenerId,
    kind: EventKind,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    pub(crate) fn new(id: ListenerId, kind: EventKind, registry: &Arc<ListenerRegistry>) -> Self {
        Self {
            id,
            kind,
            registry: Arc::downgrade(registry),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Removes the listener. Returns `false` if the channel is already gone.
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.id))
    }
}
