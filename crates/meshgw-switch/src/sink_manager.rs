//! Sink registry (§4.4): a name→[`Sink`] map plus an owner→name index,
//! driven by bus lifecycle signals.
//!
//! Grounded on the teacher's `DashMap`-backed registry
//! (`spark-switch::core::session_manager::SessionManager`): the same
//! "wrap a `DashMap`, never hand out the map itself" shape, with the
//! Call-ID key replaced by the sink name and insert/remove driven by bus
//! callbacks instead of an explicit `create_session` call.

use std::sync::Arc;

use dashmap::DashMap;
use meshgw_core::identity::{SinkIdentity, UNKNOWN_SINK_NAME};
use meshgw_sinkbus::{SinkBus, SinkLifecycleListener};
use parking_lot::RwLock;

use crate::sink::Sink;

/// Maintains the live set of sinks and the transient owner→name mapping
/// used to attribute uplink traffic (§4.4).
pub struct SinkManager {
    bus: Arc<dyn SinkBus>,
    sinks: DashMap<String, Arc<Sink>>,
    owners: DashMap<String, String>,
    on_removed: RwLock<Option<Box<dyn Fn(&str) + Send + Sync>>>,
}

impl SinkManager {
    /// Creates a manager and subscribes it to `bus`'s lifecycle signals.
    /// Returned wrapped in `Arc` since the manager registers `self` as a
    /// listener and must outlive every future callback.
    pub fn new(bus: Arc<dyn SinkBus>) -> Arc<Self> {
        let manager = Arc::new(Self {
            bus: bus.clone(),
            sinks: DashMap::new(),
            owners: DashMap::new(),
            on_removed: RwLock::new(None),
        });
        bus.subscribe_lifecycle(manager.clone() as Arc<dyn SinkLifecycleListener>);
        manager
    }

    /// Registers the callback invoked when a sink disappears, after it has
    /// already been dropped from both maps.
    pub fn on_removed(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        *self.on_removed.write() = Some(Box::new(callback));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Sink>> {
        self.sinks.get(name).map(|entry| entry.value().clone())
    }

    /// Snapshot of every currently live sink. Safe to iterate while other
    /// threads mutate the registry: this is a copy of the `Arc`s, not a
    /// live view.
    pub fn get_sinks(&self) -> Vec<Arc<Sink>> {
        self.sinks.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Resolves a bus-transient owner id to its stable sink name. An
    /// unresolved owner is logged and mapped to the `"unknown"` sentinel
    /// (§4.4) rather than propagated as an error, since uplink delivery
    /// must not stall on a lookup miss.
    pub fn resolve_owner(&self, owner: &str) -> String {
        match self.owners.get(owner) {
            Some(name) => name.clone(),
            None => {
                tracing::error!(owner, "uplink from unknown bus owner id");
                UNKNOWN_SINK_NAME.to_string()
            }
        }
    }

    fn insert(&self, name: &str, owner: &str) {
        // Tie-break (§4.4): a name reappearing before its prior removal
        // completed is treated as an atomic remove-then-add rather than a
        // stale duplicate.
        self.sinks.remove(name);
        self.owners.retain(|_, existing_name| existing_name != name);

        let sink = Arc::new(Sink::new(SinkIdentity::new(name, owner), self.bus.clone()));
        self.sinks.insert(name.to_string(), sink);
        self.owners.insert(owner.to_string(), name.to_string());
    }

    fn remove(&self, name: &str) {
        if self.sinks.remove(name).is_some() {
            self.owners.retain(|_, existing_name| existing_name != name);
            if let Some(callback) = self.on_removed.read().as_ref() {
                callback(name);
            }
        }
    }
}

impl SinkLifecycleListener for SinkManager {
    fn on_appear(&self, name: &str, owner: &str) {
        self.insert(name, owner);
    }

    fn on_disappear(&self, name: &str) {
        self.remove(name);
    }

    fn on_stack_started(&self, name: &str) {
        if let Some(sink) = self.sinks.get(name) {
            sink.on_stack_started();
        }
    }

    fn on_stack_stopped(&self, name: &str) {
        if let Some(sink) = self.sinks.get(name) {
            sink.on_stack_stopped();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgw_sinkbus::InMemorySinkBus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn appear_registers_sink_and_owner_index() {
        let bus = Arc::new(InMemorySinkBus::new());
        let manager = SinkManager::new(bus.clone());

        bus.insert_sink("sink0", "owner-1");

        assert_eq!(manager.len(), 1);
        assert!(manager.get("sink0").is_some());
        assert_eq!(manager.resolve_owner("owner-1"), "sink0");
    }

    #[test]
    fn disappear_drops_entries_and_invokes_callback() {
        let bus = Arc::new(InMemorySinkBus::new());
        let manager = SinkManager::new(bus.clone());
        let removed = Arc::new(AtomicUsize::new(0));
        let removed_clone = removed.clone();
        manager.on_removed(move |_name| {
            removed_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.insert_sink("sink0", "owner-1");
        bus.remove_sink("sink0");

        assert!(manager.is_empty());
        assert_eq!(removed.load(Ordering::SeqCst), 1);
        assert_eq!(manager.resolve_owner("owner-1"), "unknown");
    }

    #[test]
    fn stack_started_and_stopped_update_the_sink() {
        let bus = Arc::new(InMemorySinkBus::new());
        let manager = SinkManager::new(bus.clone());
        bus.insert_sink("sink0", "owner-1");

        bus.start_stack("sink0");
        assert!(manager.get("sink0").unwrap().is_started());

        bus.stop_stack("sink0");
        assert!(!manager.get("sink0").unwrap().is_started());
    }
}
