//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the balancer topology.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Front listener and routing strategy.
    pub balancer: BalancerConfig,

    /// Backend servers registered with the strategy.
    pub backends: Vec<BackendConfig>,

    /// Socket timeouts.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            balancer: BalancerConfig::default(),
            backends: (1004..1014)
                .map(|port| BackendConfig::local(format!("localhost:{}", port)))
                .collect(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Balancer listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Bind address (e.g., "0.0.0.0:1003").
    pub bind_address: String,

    /// Worker threads handling proxied connections.
    pub workers: usize,

    /// Backend selection policy.
    pub strategy: StrategyKind,

    /// Ring settings, used by the consistent hash strategy only.
    pub hashing: HashingConfig,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:1003".to_string(),
            workers: 10,
            strategy: StrategyKind::default(),
            hashing: HashingConfig::default(),
        }
    }
}

/// Available routing strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ConsistentHash,
    #[default]
    LeastLoaded,
}

/// Consistent hash ring settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HashingConfig {
    /// Digest name ("md5" or "sha256"). Checked when the strategy is built.
    pub algorithm: String,

    /// Prefix mixed into every hashed key.
    pub salt: String,

    /// Ring points per backend.
    pub replicas: usize,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            algorithm: "md5".to_string(),
            salt: "quertyuuid".to_string(),
            replicas: 1,
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend identity, `host:port`.
    pub address: String,

    /// Also run a direct-mode server on this address's port.
    #[serde(default)]
    pub local: bool,

    /// Worker threads for the local server.
    #[serde(default = "default_backend_workers")]
    pub workers: usize,
}

impl BackendConfig {
    /// A remote backend that is only registered, not served.
    pub fn remote(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            local: false,
            workers: default_backend_workers(),
        }
    }

    /// A backend served in-process by a direct-mode listener.
    pub fn local(address: impl Into<String>) -> Self {
        Self {
            local: true,
            ..Self::remote(address)
        }
    }
}

fn default_backend_workers() -> usize {
    10
}

/// Timeout configuration for socket operations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Outbound connection timeout in seconds (0 = OS default).
    pub connect_secs: u64,

    /// Socket read timeout in seconds (0 = wait indefinitely).
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            idle_secs: 0,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (e.g., "l7_balancer=debug").
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "l7_balancer=info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_topology_has_ten_local_backends() {
        let config = Config::default();
        assert_eq!(config.balancer.bind_address, "0.0.0.0:1003");
        assert_eq!(config.balancer.workers, 10);
        assert_eq!(config.balancer.strategy, StrategyKind::LeastLoaded);
        assert_eq!(config.backends.len(), 10);
        assert_eq!(config.backends[0].address, "localhost:1004");
        assert_eq!(config.backends[9].address, "localhost:1013");
        assert!(config.backends.iter().all(|b| b.local && b.workers == 10));
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [balancer]
            strategy = "consistent_hash"

            [balancer.hashing]
            algorithm = "sha256"

            [[backends]]
            address = "10.0.0.1:80"

            [[backends]]
            address = "localhost:2001"
            local = true
            workers = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.balancer.strategy, StrategyKind::ConsistentHash);
        assert_eq!(config.balancer.hashing.algorithm, "sha256");
        assert_eq!(config.balancer.hashing.salt, "quertyuuid");
        assert_eq!(config.balancer.workers, 10);
        assert_eq!(
            config.backends,
            vec![
                BackendConfig::remote("10.0.0.1:80"),
                BackendConfig {
                    address: "localhost:2001".into(),
                    local: true,
                    workers: 2,
                },
            ]
        );
    }

    #[test]
    fn unknown_strategy_is_a_parse_error() {
        let result: Result<Config, _> = toml::from_str("[balancer]\nstrategy = \"random\"\n");
        assert!(result.is_err());
    }
}
