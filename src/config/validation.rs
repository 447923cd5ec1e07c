//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (worker counts, replicas, ports)
//! - Detect duplicate backend identities
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Config → Result<(), Vec<ValidationError>>
//! - Remote backend addresses are not parsed here: a malformed one is
//!   registered anyway and aborts at forward time
//! - The ring digest name is checked when the strategy is built

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::Config;
use crate::load_balancer::BackendId;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("balancer.bind_address {0:?} is not a socket address")]
    InvalidBindAddress(String),

    #[error("balancer.workers must be at least 1")]
    NoBalancerWorkers,

    #[error("balancer.hashing.replicas must be at least 1")]
    NoReplicas,

    #[error("backend address must not be empty")]
    EmptyBackendAddress,

    #[error("backend {0} is listed more than once")]
    DuplicateBackend(String),

    #[error("backend {0} must have at least one worker")]
    NoBackendWorkers(String),

    #[error("local backend {0} needs a host:port address with a numeric port")]
    InvalidLocalAddress(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let balancer = &config.balancer;

    if balancer.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(balancer.bind_address.clone()));
    }
    if balancer.workers == 0 {
        errors.push(ValidationError::NoBalancerWorkers);
    }
    if balancer.hashing.replicas == 0 {
        errors.push(ValidationError::NoReplicas);
    }

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if backend.address.is_empty() {
            errors.push(ValidationError::EmptyBackendAddress);
            continue;
        }
        if !seen.insert(backend.address.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.address.clone()));
        }
        if backend.local {
            if backend.workers == 0 {
                errors.push(ValidationError::NoBackendWorkers(backend.address.clone()));
            }
            if BackendId::from(backend.address.as_str()).host_port().is_none() {
                errors.push(ValidationError::InvalidLocalAddress(backend.address.clone()));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
