//! Least-loaded ("dynamic weighted round robin") strategy.
//!
//! Every backend carries a load counter. Selection takes the entry with the
//! lowest load, bumps it and puts it back; relief lowers it again. Among
//! equally loaded backends the one that was (re)queued longest ago wins, so
//! an idle pool is walked in insertion order like plain round robin.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::load_balancer::{BackendId, RoutingStrategy};
use crate::observability::metrics;

/// Position in the priority order: ascending load, then queue age.
type QueueKey = (i64, u64);

#[derive(Debug, Default)]
struct LoadTable {
    /// Priority order over live entries.
    queue: BTreeMap<QueueKey, BackendId>,
    /// Identity → current queue key. Always the same entry set as `queue`.
    index: HashMap<BackendId, QueueKey>,
    next_seq: u64,
}

impl LoadTable {
    fn enqueue(&mut self, id: BackendId, load: i64) {
        let key = (load, self.next_seq);
        self.next_seq += 1;
        self.queue.insert(key, id.clone());
        self.index.insert(id, key);
    }

    fn dequeue(&mut self, id: &BackendId) -> Option<i64> {
        let key = self.index.remove(id)?;
        self.queue.remove(&key);
        Some(key.0)
    }
}

/// Router favouring the backend with the fewest outstanding requests.
#[derive(Debug, Default)]
pub struct LeastLoadedRouter {
    table: Mutex<LoadTable>,
}

impl LeastLoadedRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current load of `id`, if registered.
    pub fn load_of(&self, id: &BackendId) -> Option<i64> {
        self.table.lock().index.get(id).map(|key| key.0)
    }
}

impl RoutingStrategy for LeastLoadedRouter {
    fn add_server(&self, id: BackendId) {
        let mut table = self.table.lock();
        if table.index.contains_key(&id) {
            tracing::debug!(backend = %id, "Backend already registered");
            return;
        }
        tracing::debug!(backend = %id, "Backend added");
        table.enqueue(id, 0);
    }

    fn remove_server(&self, id: &BackendId) {
        let mut table = self.table.lock();
        if table.dequeue(id).is_some() {
            tracing::debug!(backend = %id, "Backend removed");
        }
    }

    fn select_server(&self, _routing_key: &str) -> Option<BackendId> {
        let mut table = self.table.lock();
        let ((load, _), id) = table.queue.pop_first()?;
        table.index.remove(&id);
        table.enqueue(id.clone(), load + 1);
        drop(table);

        tracing::debug!(backend = %id, load = load + 1, "Selected least loaded backend");
        metrics::record_selection(self.name(), &id);
        Some(id)
    }

    fn relieve_server(&self, id: &BackendId) {
        let mut table = self.table.lock();
        // Load may go negative; it is not clamped.
        if let Some(load) = table.dequeue(id) {
            table.enqueue(id.clone(), load - 1);
            tracing::debug!(backend = %id, load = load - 1, "Relieved backend");
        }
    }

    fn name(&self) -> &'static str {
        "least_loaded"
    }

    fn backends(&self) -> Vec<BackendId> {
        let mut ids: Vec<BackendId> = self.table.lock().index.keys().cloned().collect();
        ids.sort();
        ids
    }
}
