//! Per-connection request handling.
//!
//! # Data Flow
//! ```text
//! Accepted TcpStream (on a pool worker)
//!     → ConnectionHandler, fixed when the listener is built:
//!         - Direct:   direct.rs reads the request, answers "200 OK"
//!         - Balancer: forwarder.rs
//!               read routing key → select backend → dial backend
//!               → relay key + headers → relieve backend
//!               → relay response until backend EOF
//!     → both sockets closed when the handler returns, on every path
//! ```
//!
//! # Design Decisions
//! - Plain `\n`-terminated lines; no HTTP parsing beyond the blank line
//!   that ends the request head
//! - Load is relieved once the request has been transmitted, not when the
//!   response completes; a forward aborted before that keeps its load
//! - An empty strategy or a malformed backend address closes the client
//!   without writing anything
//! - No retries anywhere

pub mod direct;
pub mod forwarder;
pub mod wire;

use std::io;
use std::net::TcpStream;
use std::time::Duration;

use thiserror::Error;

use crate::load_balancer::BackendId;
use crate::net::connection::ConnectionId;

pub use direct::DirectResponder;
pub use forwarder::RequestForwarder;

/// Connection-scoped failures. None of them outlive the task.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("client closed before sending a routing key")]
    EmptyRequest,

    #[error("no backend available")]
    NoBackend,

    #[error("invalid backend address: {0}")]
    InvalidAddress(BackendId),

    #[error("failed to resolve backend {backend}: {source}")]
    Resolve {
        backend: BackendId,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to backend {backend}: {source}")]
    Connect {
        backend: BackendId,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProxyError {
    /// Metric label for this failure.
    pub fn outcome(&self) -> &'static str {
        match self {
            ProxyError::EmptyRequest => "empty_request",
            ProxyError::NoBackend => "no_backend",
            ProxyError::InvalidAddress(_) => "invalid_address",
            ProxyError::Resolve { .. } => "resolve_error",
            ProxyError::Connect { .. } => "connect_error",
            ProxyError::Io(_) => "io_error",
        }
    }
}

/// What a listener does with each accepted connection.
#[derive(Debug, Clone)]
pub enum ConnectionHandler {
    /// Answer locally without contacting any backend.
    Direct(DirectResponder),
    /// Proxy through a routing strategy.
    Balancer(RequestForwarder),
}

impl ConnectionHandler {
    pub fn handle(&self, stream: TcpStream, conn: ConnectionId) -> Result<(), ProxyError> {
        match self {
            ConnectionHandler::Direct(responder) => responder.respond(stream, conn),
            ConnectionHandler::Balancer(forwarder) => forwarder.forward(stream, conn),
        }
    }

    /// Label used in listener and pool names.
    pub fn role(&self) -> &'static str {
        match self {
            ConnectionHandler::Direct(_) => "Server",
            ConnectionHandler::Balancer(_) => "Load Balancer",
        }
    }
}

/// `0` disables the timeout.
pub(crate) fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
