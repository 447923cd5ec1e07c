//! TCP listener feeding a worker pool.
//!
//! # Responsibilities
//! - Bind to a configured address
//! - Accept incoming TCP connections
//! - Submit one task per connection to the listener's worker pool
//! - Stop on request, or on an accept failure that will not clear

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use crate::lifecycle::Shutdown;
use crate::net::connection::ConnectionTracker;
use crate::proxy::ConnectionHandler;
use crate::worker::{PoolError, WorkerPool};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept: {0}")]
    Accept(#[source] io::Error),

    #[error("failed to spawn listener thread: {0}")]
    Spawn(#[source] io::Error),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("failed to wake listener on {address}: {source}")]
    Wake {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("listener thread panicked")]
    Panicked,
}

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// A bound socket that hands accepted connections to a worker pool.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
    handler: ConnectionHandler,
    pool: WorkerPool,
    name: String,
}

impl Listener {
    /// Bind `address` and start a pool of `workers` threads for `handler`.
    pub fn bind(
        address: &str,
        workers: usize,
        handler: ConnectionHandler,
    ) -> Result<Self, ListenerError> {
        let bind_err = |source| ListenerError::Bind {
            address: address.to_string(),
            source,
        };

        let inner = TcpListener::bind(address).map_err(bind_err)?;
        let local_addr = inner.local_addr().map_err(bind_err)?;

        let name = format!("{}:{}", handler.role(), local_addr.port());
        let pool = WorkerPool::new(
            format!("{} on port {}", handler.role(), local_addr.port()),
            workers,
        )?;

        tracing::info!(listener = %name, address = %local_addr, workers, "Listener bound");

        Ok(Self {
            inner,
            local_addr,
            handler,
            pool,
            name,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the accept loop on a dedicated thread.
    pub fn spawn(self) -> Result<ListenerHandle, ListenerError> {
        let shutdown = Shutdown::new();
        let tracker = ConnectionTracker::new(self.name.as_str());
        let local_addr = self.local_addr;

        let thread = {
            let shutdown = shutdown.clone();
            let tracker = tracker.clone();
            thread::Builder::new()
                .name(self.name.clone())
                .spawn(move || self.serve(&shutdown, &tracker))
                .map_err(ListenerError::Spawn)?
        };

        Ok(ListenerHandle {
            local_addr,
            shutdown,
            tracker,
            thread,
        })
    }

    /// Accept connections until `shutdown` is triggered or accept fails hard.
    ///
    /// The pool is dropped on return; queued connections are still served.
    pub fn serve(self, shutdown: &Shutdown, tracker: &ConnectionTracker) -> Result<(), ListenerError> {
        tracing::info!(listener = %self.name, "Listening");

        loop {
            if shutdown.is_triggered() {
                break;
            }

            match self.inner.accept() {
                Ok((stream, peer)) => {
                    if shutdown.is_triggered() {
                        break;
                    }
                    let guard = tracker.track();
                    tracing::debug!(
                        listener = %self.name,
                        peer_addr = %peer,
                        connection_id = %guard.id(),
                        "Client connected"
                    );

                    let handler = self.handler.clone();
                    self.pool.submit(move || {
                        let result = handler.handle(stream, guard.id());
                        drop(guard);
                        result.map_err(Into::into)
                    });
                }
                Err(e) if is_transient(&e) => {
                    tracing::warn!(listener = %self.name, error = %e, "Transient accept error");
                }
                Err(e) => {
                    tracing::error!(listener = %self.name, error = %e, "Accept failed, listener stopping");
                    return Err(ListenerError::Accept(e));
                }
            }
        }

        tracing::info!(listener = %self.name, "Listener stopped");
        Ok(())
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

/// Handle to a running listener thread.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    thread: JoinHandle<Result<(), ListenerError>>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connections accepted but not yet finished.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Stop accepting and wait for the accept loop to exit.
    ///
    /// In-flight and queued connections keep being served by the pool. If
    /// accept() cannot be woken the thread is not joined; it exits at the
    /// next connection it accepts.
    pub fn stop(self) -> Result<(), ListenerError> {
        self.shutdown.trigger();
        let address = wake_address(self.local_addr);
        if let Err(source) = TcpStream::connect_timeout(&address, WAKE_TIMEOUT) {
            tracing::warn!(address = %address, error = %source, "Could not wake listener, detaching");
            return Err(ListenerError::Wake { address, source });
        }
        self.join()
    }

    /// Block until the accept loop ends on its own.
    pub fn join(self) -> Result<(), ListenerError> {
        self.thread.join().map_err(|_| ListenerError::Panicked)?
    }
}

/// Loopback equivalent of a wildcard bind address.
fn wake_address(addr: SocketAddr) -> SocketAddr {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, addr.port())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::DirectResponder;
    use std::io::{Read, Write};
    use std::time::Instant;

    fn direct_listener() -> ListenerHandle {
        let handler = ConnectionHandler::Direct(DirectResponder::new(9999));
        Listener::bind("127.0.0.1:0", 2, handler).unwrap().spawn().unwrap()
    }

    fn request(addr: SocketAddr) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"GET / HTTP/1.1\n\n").unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn serves_connections_through_pool() {
        let handle = direct_listener();
        for _ in 0..5 {
            assert!(request(handle.local_addr()).contains("Hello from the server 9999"));
        }
        handle.stop().unwrap();
    }

    #[test]
    fn bind_conflict_is_reported() {
        let handle = direct_listener();
        let addr = handle.local_addr().to_string();
        let err = Listener::bind(&addr, 1, ConnectionHandler::Direct(DirectResponder::new(1)))
            .unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }));
        handle.stop().unwrap();
    }

    #[test]
    fn zero_workers_rejected_at_bind() {
        let err = Listener::bind("127.0.0.1:0", 0, ConnectionHandler::Direct(DirectResponder::new(1)))
            .unwrap_err();
        assert!(matches!(err, ListenerError::Pool(PoolError::NoWorkers)));
    }

    #[test]
    fn stop_ends_accept_loop() {
        let handle = direct_listener();
        let addr = handle.local_addr();
        handle.stop().unwrap();

        // The socket is closed once the listener is gone.
        let deadline = Instant::now() + Duration::from_secs(2);
        while TcpStream::connect(addr).is_ok() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(TcpStream::connect(addr).is_err());
    }

    #[test]
    fn connections_are_released_after_handling() {
        let handle = direct_listener();
        request(handle.local_addr());

        let deadline = Instant::now() + Duration::from_secs(2);
        while handle.active_connections() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(handle.active_connections(), 0);
        handle.stop().unwrap();
    }

    #[test]
    fn unreachable_listener_is_not_joined() {
        let dead = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let shutdown = Shutdown::new();
        let thread = {
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                while !shutdown.is_triggered() {
                    thread::sleep(Duration::from_millis(5));
                }
                Ok(())
            })
        };
        let handle = ListenerHandle {
            local_addr: dead,
            shutdown,
            tracker: ConnectionTracker::new("detached"),
            thread,
        };

        let started = Instant::now();
        let err = handle.stop().unwrap_err();
        assert!(matches!(err, ListenerError::Wake { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn wildcard_wakes_via_loopback() {
        let addr: SocketAddr = "0.0.0.0:1003".parse().unwrap();
        assert_eq!(wake_address(addr), "127.0.0.1:1003".parse().unwrap());
        let addr: SocketAddr = "10.1.2.3:80".parse().unwrap();
        assert_eq!(wake_address(addr), addr);
    }
}
