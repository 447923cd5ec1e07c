//! Applies backend membership changes from reloaded config to the live
//! routing strategy.
//!
//! Only the `[[backends]]` list is hot. Everything else (bind address,
//! workers, strategy kind, hashing) needs a restart and is reported as such.

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use crate::config::{BackendConfig, Config};
use crate::load_balancer::{BackendId, RoutingStrategy, SharedStrategy};

/// Identities to add to and remove from a strategy.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MembershipChange {
    pub added: Vec<BackendId>,
    pub removed: Vec<BackendId>,
}

impl MembershipChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compare two backend lists by configured address, mapping each address
/// through `aliases` to the identity the strategy actually holds.
pub fn diff_backends(
    current: &[BackendConfig],
    next: &[BackendConfig],
    aliases: &HashMap<String, BackendId>,
) -> MembershipChange {
    let resolve = |addr: &&str| {
        aliases
            .get(*addr)
            .cloned()
            .unwrap_or_else(|| BackendId::from(*addr))
    };
    let before: BTreeSet<&str> = current.iter().map(|b| b.address.as_str()).collect();
    let after: BTreeSet<&str> = next.iter().map(|b| b.address.as_str()).collect();

    MembershipChange {
        added: after.difference(&before).map(resolve).collect(),
        removed: before.difference(&after).map(resolve).collect(),
    }
}

/// Removals first, so a replaced address never shares the ring with its
/// successor.
pub fn apply_change(strategy: &dyn RoutingStrategy, change: &MembershipChange) {
    for id in &change.removed {
        strategy.remove_server(id);
        tracing::info!(backend = %id, strategy = strategy.name(), "Backend removed");
    }
    for id in &change.added {
        strategy.add_server(id.clone());
        tracing::info!(backend = %id, strategy = strategy.name(), "Backend added");
    }
}

/// Consume config updates until the sender is dropped.
pub fn spawn_reloader(
    strategy: SharedStrategy,
    initial: Config,
    aliases: HashMap<String, BackendId>,
    updates: Receiver<Config>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("config-reloader".into())
        .spawn(move || {
            let mut current = initial;
            for next in updates {
                if next.balancer != current.balancer || next.timeouts != current.timeouts {
                    tracing::warn!("Balancer settings changed; restart required to apply them");
                }
                let change = diff_backends(&current.backends, &next.backends, &aliases);
                let unstarted = next
                    .backends
                    .iter()
                    .filter(|b| b.local && change.added.iter().any(|id| id.as_str() == b.address))
                    .count();
                if unstarted > 0 {
                    tracing::warn!(count = unstarted, "New local backends are routed to but not started until restart");
                }

                if change.is_empty() {
                    tracing::debug!("Reloaded config has no membership changes");
                } else {
                    apply_change(&*strategy, &change);
                    tracing::info!(
                        added = change.added.len(),
                        removed = change.removed.len(),
                        backends = strategy.backends().len(),
                        "Backend membership updated"
                    );
                }
                current = next;
            }
            tracing::debug!("Config update channel closed");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::LeastLoadedRouter;
    use std::sync::{mpsc, Arc};

    fn remotes(addrs: &[&str]) -> Vec<BackendConfig> {
        addrs.iter().map(|a| BackendConfig::remote(*a)).collect()
    }

    #[test]
    fn diff_reports_added_and_removed() {
        let change = diff_backends(
            &remotes(&["a:1", "b:1"]),
            &remotes(&["b:1", "c:1"]),
            &HashMap::new(),
        );
        assert_eq!(change.added, vec![BackendId::from("c:1")]);
        assert_eq!(change.removed, vec![BackendId::from("a:1")]);
    }

    #[test]
    fn unchanged_lists_produce_no_change() {
        let list = remotes(&["a:1", "b:1"]);
        assert!(diff_backends(&list, &list, &HashMap::new()).is_empty());
    }

    #[test]
    fn apply_updates_strategy_membership() {
        let router = LeastLoadedRouter::new();
        router.add_server(BackendId::from("a:1"));
        router.add_server(BackendId::from("b:1"));

        let change = diff_backends(
            &remotes(&["a:1", "b:1"]),
            &remotes(&["b:1", "c:1"]),
            &HashMap::new(),
        );
        apply_change(&router, &change);

        assert_eq!(
            router.backends(),
            vec![BackendId::from("b:1"), BackendId::from("c:1")]
        );
    }

    #[test]
    fn reloader_applies_updates_then_exits() {
        let router = Arc::new(LeastLoadedRouter::new());
        router.add_server(BackendId::from("a:1"));

        let initial = Config {
            backends: remotes(&["a:1"]),
            ..Config::default()
        };
        let next = Config {
            backends: remotes(&["d:1"]),
            ..Config::default()
        };

        let (tx, rx) = mpsc::channel();
        let handle = spawn_reloader(router.clone(), initial, HashMap::new(), rx).unwrap();
        tx.send(next).unwrap();
        drop(tx);
        handle.join().unwrap();

        assert_eq!(router.backends(), vec![BackendId::from("d:1")]);
    }

    #[test]
    fn removing_port_zero_backend_removes_its_bound_identity() {
        let router = Arc::new(LeastLoadedRouter::new());
        let bound = BackendId::from("127.0.0.1:40123");
        router.add_server(bound.clone());
        router.add_server(BackendId::from("a:1"));

        let aliases = HashMap::from([("127.0.0.1:0".to_string(), bound.clone())]);
        let current = vec![BackendConfig::local("127.0.0.1:0"), BackendConfig::remote("a:1")];

        let change = diff_backends(&current, &remotes(&["a:1"]), &aliases);
        assert_eq!(change.removed, vec![bound]);

        apply_change(&*router, &change);
        assert_eq!(router.backends(), vec![BackendId::from("a:1")]);
    }
}
