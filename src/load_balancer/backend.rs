//! Backend identity.
//!
//! # Responsibilities
//! - Name a backend by its `host:port` string
//! - Split that string into a host and port for dialing

use std::fmt;
use std::sync::Arc;

/// Opaque `host:port` key identifying one backend.
///
/// Used both as the routing result and as the map key inside strategies.
/// Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId(Arc<str>);

impl BackendId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(host, port)`.
    ///
    /// Returns `None` when there is no `:` separator or the port is not a
    /// valid u16. Bracketed IPv6 hosts (`[::1]:80`) are unwrapped.
    pub fn host_port(&self) -> Option<(&str, u16)> {
        let (host, port) = self.0.rsplit_once(':')?;
        let port = port.parse::<u16>().ok()?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return None;
        }
        Some((host, port))
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BackendId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_port() {
        let id = BackendId::from("localhost:1004");
        assert_eq!(id.host_port(), Some(("localhost", 1004)));

        let v6 = BackendId::from("[::1]:8080");
        assert_eq!(v6.host_port(), Some(("::1", 8080)));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert_eq!(BackendId::from("badaddress").host_port(), None);
        assert_eq!(BackendId::from("localhost:http").host_port(), None);
        assert_eq!(BackendId::from("localhost:70000").host_port(), None);
        assert_eq!(BackendId::from(":8080").host_port(), None);
    }
}
