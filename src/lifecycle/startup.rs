//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the routing strategy (fails fast on bad strategy config)
//! - Start a direct-mode listener for every local backend
//! - Register every backend identity with the strategy
//! - Start the balancer listener last
//!
//! # Design Decisions
//! - A listener that cannot bind is logged and skipped; the rest still start
//! - Backends registered with the strategy regardless of whether they are up
//! - A local backend configured on port 0 is registered under its real port

use std::collections::HashMap;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::{BackendConfig, Config};
use crate::load_balancer::{build_strategy, BackendId, SharedStrategy, StrategyError};
use crate::net::{Listener, ListenerError, ListenerHandle};
use crate::proxy::{timeout_from_secs, ConnectionHandler, DirectResponder, RequestForwarder};

/// Errors that prevent the topology from running at all.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid routing strategy: {0}")]
    Strategy(#[from] StrategyError),

    #[error("no listener could be started")]
    NothingRunning,
}

/// The running set of listeners sharing one routing strategy.
#[derive(Debug)]
pub struct Topology {
    strategy: SharedStrategy,
    balancer: Option<ListenerHandle>,
    backends: Vec<ListenerHandle>,
    /// Configured address → identity registered for it, where they differ.
    aliases: HashMap<String, BackendId>,
}

impl Topology {
    /// Start every configured listener.
    pub fn start(config: &Config) -> Result<Self, StartupError> {
        let strategy = build_strategy(&config.balancer)?;
        let read_timeout = timeout_from_secs(config.timeouts.idle_secs);
        let connect_timeout = timeout_from_secs(config.timeouts.connect_secs);

        let mut backends = Vec::new();
        let mut aliases = HashMap::new();
        for backend in &config.backends {
            let identity = if backend.local {
                match start_local_backend(backend, config.timeouts.idle_secs) {
                    Ok(handle) => {
                        let identity = registered_identity(&backend.address, handle.local_addr());
                        backends.push(handle);
                        identity
                    }
                    Err(e) => {
                        tracing::error!(backend = %backend.address, error = %e, "Backend server failed to start");
                        BackendId::from(backend.address.as_str())
                    }
                }
            } else {
                BackendId::from(backend.address.as_str())
            };
            if identity.as_str() != backend.address {
                aliases.insert(backend.address.clone(), identity.clone());
            }
            strategy.add_server(identity);
        }

        let forwarder = RequestForwarder::new(strategy.clone())
            .with_connect_timeout(connect_timeout)
            .with_read_timeout(read_timeout);
        let balancer = match Listener::bind(
            &config.balancer.bind_address,
            config.balancer.workers,
            ConnectionHandler::Balancer(forwarder),
        )
        .and_then(Listener::spawn)
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(address = %config.balancer.bind_address, error = %e, "Load balancer failed to start");
                None
            }
        };

        if balancer.is_none() && backends.is_empty() {
            return Err(StartupError::NothingRunning);
        }

        tracing::info!(
            strategy = strategy.name(),
            balancer = ?balancer.as_ref().map(ListenerHandle::local_addr),
            backends = strategy.backends().len(),
            local_servers = backends.len(),
            "Topology started"
        );

        Ok(Self {
            strategy,
            balancer,
            backends,
            aliases,
        })
    }

    pub fn strategy(&self) -> &SharedStrategy {
        &self.strategy
    }

    /// Identities registered under a different name than configured
    /// (local backends on port 0), keyed by configured address.
    pub fn aliases(&self) -> &HashMap<String, BackendId> {
        &self.aliases
    }

    pub fn balancer_addr(&self) -> Option<SocketAddr> {
        self.balancer.as_ref().map(ListenerHandle::local_addr)
    }

    pub fn backend_addrs(&self) -> Vec<SocketAddr> {
        self.backends.iter().map(ListenerHandle::local_addr).collect()
    }

    /// Block until every listener has ended.
    pub fn wait(self) {
        for (role, handle) in self.into_handles() {
            if let Err(e) = handle.join() {
                tracing::error!(role, error = %e, "Listener ended with error");
            }
        }
    }

    /// Stop every listener, balancer first.
    pub fn stop(self) {
        for (role, handle) in self.into_handles() {
            if let Err(e) = handle.stop() {
                tracing::error!(role, error = %e, "Listener stopped with error");
            }
        }
    }

    fn into_handles(self) -> impl Iterator<Item = (&'static str, ListenerHandle)> {
        self.balancer
            .into_iter()
            .map(|h| ("balancer", h))
            .chain(self.backends.into_iter().map(|h| ("backend", h)))
    }
}

fn start_local_backend(backend: &BackendConfig, idle_secs: u64) -> Result<ListenerHandle, ListenerError> {
    // Validation guarantees local addresses carry a port.
    let port = BackendId::from(backend.address.as_str())
        .host_port()
        .map(|(_, port)| port)
        .unwrap_or(0);

    let responder = DirectResponder::new(port).with_read_timeout(timeout_from_secs(idle_secs));
    Listener::bind(
        &format!("0.0.0.0:{}", port),
        backend.workers,
        ConnectionHandler::Direct(responder),
    )?
    .spawn()
}

/// Identity to register for a local backend bound at `bound`.
fn registered_identity(address: &str, bound: SocketAddr) -> BackendId {
    let id = BackendId::from(address);
    match id.host_port() {
        Some((host, 0)) if host.contains(':') => BackendId::from(format!("[{}]:{}", host, bound.port())),
        Some((host, 0)) => BackendId::from(format!("{}:{}", host, bound.port())),
        _ => id,
    }
}
