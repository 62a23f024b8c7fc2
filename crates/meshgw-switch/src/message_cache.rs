//! Bounded time-windowed set of recently seen request identifiers, for
//! at-most-once request handling (§4.5).
//!
//! Grounded on the same `DashMap` idiom as
//! [`crate::sink_manager::SinkManager`], scaled down to the single
//! operation this structure actually needs: "is this id fresh".

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// `add`/`contains`/`size` over a window `W`, swept by a background
/// cleaner every `P ≤ W` (§4.5 `MessageCache`).
pub struct MessageCache {
    window: Duration,
    entries: DashMap<u64, Instant>,
}

impl MessageCache {
    pub fn new(window: Duration) -> Arc<Self> {
        Arc::new(Self {
            window,
            entries: DashMap::new(),
        })
    }

    /// Inserts `id`, returning `true` iff it is new or its previous entry
    /// had already aged out of the window — in the latter case it is
    /// treated as a new, distinct request rather than a refresh. A hit on
    /// a still-fresh entry only refreshes its timestamp and returns
    /// `false`.
    pub fn add(&self, id: u64) -> bool {
        let now = Instant::now();
        match self.entries.entry(id) {
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let stale = now.duration_since(*occupied.get()) >= self.window;
                occupied.insert(now);
                stale
            }
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        match self.entries.get(&id) {
            Some(inserted_at) => Instant::now().duration_since(*inserted_at) < self.window,
            None => false,
        }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Removes every entry older than `window`. Invariant (§4.5, §8): any
    /// entry older than `W` is gone by the next cleanup tick and never
    /// served as present again.
    fn sweep(&self) {
        let now = Instant::now();
        self.entries.retain(|_, inserted_at| now.duration_since(*inserted_at) < self.window);
    }

    /// Spawns the periodic cleaner on the current Tokio runtime, ticking
    /// every `period` (must be ≤ `window`, per §4.5). The returned handle
    /// aborts the task when dropped by the caller.
    pub fn spawn_cleaner(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                cache.sweep();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_true_only_on_first_insertion() {
        let cache = MessageCache::new(Duration::from_secs(60));
        assert!(cache.add(1));
        assert!(!cache.add(1));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn contains_reflects_presence() {
        let cache = MessageCache::new(Duration::from_secs(60));
        assert!(!cache.contains(7));
        cache.add(7);
        assert!(cache.contains(7));
    }

    #[tokio::test]
    async fn sweep_evicts_entries_past_the_window() {
        let cache = MessageCache::new(Duration::from_millis(10));
        cache.add(1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.sweep();
        assert_eq!(cache.size(), 0);
        assert!(!cache.contains(1));
    }

    #[tokio::test]
    async fn add_on_stale_entry_is_treated_as_new() {
        let cache = MessageCache::new(Duration::from_millis(10));
        assert!(cache.add(1));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.add(1));
    }
}
