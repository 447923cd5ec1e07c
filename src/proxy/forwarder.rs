//! Balancer-mode handler: proxies one request to a selected backend.
//!
//! # Responsibilities
//! - Take the first request line as the routing key
//! - Ask the strategy for a backend and dial it
//! - Relay request head, relieve the backend, relay the response
//!
//! A forward that aborts before the head is relayed (bad address, dial
//! failure, I/O error) leaves its load on the backend, so a dead backend
//! drifts away from selection under the least-loaded strategy.

use std::io::{BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::load_balancer::{BackendId, SharedStrategy};
use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::proxy::{wire, ProxyError};

/// Proxies client connections through a routing strategy.
#[derive(Debug, Clone)]
pub struct RequestForwarder {
    strategy: SharedStrategy,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
}

impl RequestForwarder {
    pub fn new(strategy: SharedStrategy) -> Self {
        Self {
            strategy,
            connect_timeout: None,
            read_timeout: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn strategy(&self) -> &SharedStrategy {
        &self.strategy
    }

    /// Handle one client connection end to end.
    pub fn forward(&self, client: TcpStream, conn: ConnectionId) -> Result<(), ProxyError> {
        let result = self.proxy(client, conn);
        match &result {
            Ok(()) => metrics::record_forward("ok"),
            Err(e) => metrics::record_forward(e.outcome()),
        }
        result
    }

    fn proxy(&self, client: TcpStream, conn: ConnectionId) -> Result<(), ProxyError> {
        client.set_read_timeout(self.read_timeout)?;
        let mut client_reader = BufReader::new(client.try_clone()?);
        let mut client_writer = BufWriter::new(client);

        let routing_key = wire::read_line(&mut client_reader)?.ok_or(ProxyError::EmptyRequest)?;
        let key = String::from_utf8_lossy(&routing_key);
        tracing::debug!(connection_id = %conn, routing_key = %key, "Read routing key");

        let backend = self
            .strategy
            .select_server(&key)
            .ok_or(ProxyError::NoBackend)?;

        tracing::debug!(connection_id = %conn, backend = %backend, "Forwarding request");
        let upstream = self.connect(&backend)?;
        upstream.set_read_timeout(self.read_timeout)?;
        let mut upstream_writer = BufWriter::new(upstream.try_clone()?);
        let mut upstream_reader = BufReader::new(upstream);

        wire::write_line(&mut upstream_writer, &routing_key)?;
        let headers = wire::relay_headers(&mut client_reader, &mut upstream_writer)?;
        upstream_writer.flush()?;
        self.strategy.relieve_server(&backend);

        let lines = wire::relay_to_end(&mut upstream_reader, &mut client_writer)?;
        tracing::debug!(
            connection_id = %conn,
            backend = %backend,
            request_headers = headers,
            response_lines = lines,
            "Response forwarded to client"
        );
        Ok(())
    }

    fn connect(&self, backend: &BackendId) -> Result<TcpStream, ProxyError> {
        let (host, port) = backend
            .host_port()
            .ok_or_else(|| ProxyError::InvalidAddress(backend.clone()))?;

        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| ProxyError::Resolve {
                backend: backend.clone(),
                source,
            })?
            .collect();

        let mut last_err = None;
        for addr in &addrs {
            let attempt = match self.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }

        let source = last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
        });
        Err(ProxyError::Connect {
            backend: backend.clone(),
            source,
        })
    }
}
