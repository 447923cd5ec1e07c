//! Consistent hashing strategy.
//!
//! Backends and routing keys are placed on a 128-bit ring by digest. A key is
//! served by the first backend point at or after its own position, wrapping to
//! the lowest point. Adding or removing a backend only moves the keys between
//! that backend's points and their ring predecessors.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::load_balancer::{BackendId, HashAlgorithm, RoutingStrategy, StrategyError};
use crate::observability::metrics;

/// Ring-based router giving stable key → backend affinity.
#[derive(Debug)]
pub struct ConsistentHashRouter {
    ring: RwLock<BTreeMap<u128, BackendId>>,
    algorithm: HashAlgorithm,
    salt: String,
    /// Ring points per backend.
    replicas: usize,
}

impl ConsistentHashRouter {
    pub fn new(
        algorithm: HashAlgorithm,
        salt: impl Into<String>,
        replicas: usize,
    ) -> Result<Self, StrategyError> {
        if replicas == 0 {
            return Err(StrategyError::NoReplicas);
        }
        Ok(Self {
            ring: RwLock::new(BTreeMap::new()),
            algorithm,
            salt: salt.into(),
            replicas,
        })
    }

    /// Ring positions owned by `id`. Point 0 is the bare identity.
    fn points(&self, id: &BackendId) -> impl Iterator<Item = u128> + '_ {
        let id = id.as_str().to_owned();
        (0..self.replicas).map(move |i| {
            if i == 0 {
                self.algorithm.position(&self.salt, &id)
            } else {
                self.algorithm.position(&self.salt, &format!("{}#{}", id, i))
            }
        })
    }

    /// Number of occupied ring points.
    pub fn ring_len(&self) -> usize {
        self.ring.read().len()
    }
}

impl RoutingStrategy for ConsistentHashRouter {
    fn add_server(&self, id: BackendId) {
        let points: Vec<u128> = self.points(&id).collect();
        let mut ring = self.ring.write();
        for point in points {
            if let Some(previous) = ring.insert(point, id.clone()) {
                if previous != id {
                    tracing::warn!(backend = %id, evicted = %previous, "Ring position collision");
                }
            }
        }
        tracing::debug!(backend = %id, ring_points = ring.len(), "Backend added to ring");
    }

    fn remove_server(&self, id: &BackendId) {
        let points: Vec<u128> = self.points(id).collect();
        let mut ring = self.ring.write();
        for point in points {
            // Leave the point alone if a colliding backend now owns it.
            if ring.get(&point) == Some(id) {
                ring.remove(&point);
            }
        }
        tracing::debug!(backend = %id, ring_points = ring.len(), "Backend removed from ring");
    }

    fn select_server(&self, routing_key: &str) -> Option<BackendId> {
        let position = self.algorithm.position(&self.salt, routing_key);
        let ring = self.ring.read();

        let selected = ring
            .range(position..)
            .next()
            .or_else(|| ring.iter().next())
            .map(|(_, id)| id.clone())?;

        tracing::debug!(
            routing_key = %routing_key,
            backend = %selected,
            "Selected backend by consistent hash"
        );
        metrics::record_selection(self.name(), &selected);
        Some(selected)
    }

    fn relieve_server(&self, id: &BackendId) {
        // No load state on the ring.
        tracing::debug!(backend = %id, "Relieving server");
    }

    fn name(&self) -> &'static str {
        "consistent_hash"
    }

    fn backends(&self) -> Vec<BackendId> {
        let mut ids: Vec<BackendId> = self.ring.read().values().cloned().collect();
        ids.sort();
        ids.dedup();
        ids
    }
}
