//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Routing key (first request line)
//!     → RoutingStrategy::select_server
//!         - consistent_hash.rs (ring lookup, key affinity)
//!         - least_loaded.rs (pick backend with lowest load counter)
//!     → BackendId ("host:port") handed to the forwarder
//!     → RoutingStrategy::relieve_server once the request is transmitted
//! ```
//!
//! # Design Decisions
//! - One trait, two interchangeable strategies chosen from config at startup
//! - Each strategy owns its state behind a single lock; every call holds it
//!   for its full duration, so no call observes a partial mutation
//! - Unknown identities are no-ops for remove/relieve, never errors
//! - Ring digest is validated when the strategy is built, not per lookup

pub mod backend;
pub mod consistent_hash;
pub mod digest;
pub mod least_loaded;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{BalancerConfig, StrategyKind};

pub use backend::BackendId;
pub use consistent_hash::ConsistentHashRouter;
pub use digest::HashAlgorithm;
pub use least_loaded::LeastLoadedRouter;

/// Errors raised while constructing a routing strategy.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("unsupported ring digest algorithm: {0}")]
    UnsupportedDigest(String),

    #[error("ring replicas must be at least 1")]
    NoReplicas,
}

/// A backend selection policy shared by all balancer workers.
///
/// Implementations must be safe to call concurrently and must never block
/// beyond their own internal lock.
pub trait RoutingStrategy: Send + Sync + std::fmt::Debug {
    /// Register a backend.
    fn add_server(&self, id: BackendId);

    /// Deregister a backend. Unknown identities are ignored.
    fn remove_server(&self, id: &BackendId);

    /// Pick a backend for `routing_key`, or `None` when nothing is registered.
    fn select_server(&self, routing_key: &str) -> Option<BackendId>;

    /// Signal that one request to `id` has been fully transmitted.
    fn relieve_server(&self, id: &BackendId);

    /// Short name for logs and metric labels.
    fn name(&self) -> &'static str;

    /// Snapshot of the registered identities.
    fn backends(&self) -> Vec<BackendId>;
}

/// Shared handle to a routing strategy.
pub type SharedStrategy = Arc<dyn RoutingStrategy>;

/// Build the configured strategy with no backends registered.
pub fn build_strategy(config: &BalancerConfig) -> Result<SharedStrategy, StrategyError> {
    let strategy: SharedStrategy = match config.strategy {
        StrategyKind::ConsistentHash => {
            let hashing = &config.hashing;
            let algorithm: HashAlgorithm = hashing.algorithm.parse()?;
            Arc::new(ConsistentHashRouter::new(
                algorithm,
                hashing.salt.clone(),
                hashing.replicas,
            )?)
        }
        StrategyKind::LeastLoaded => Arc::new(LeastLoadedRouter::new()),
    };

    tracing::info!(strategy = strategy.name(), "Routing strategy initialized");
    Ok(strategy)
}
