//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop on its own thread)
//!     → connection.rs (connection ID, active count guard)
//!     → worker pool task running the listener's ConnectionHandler
//! ```
//!
//! # Design Decisions
//! - One listener, one pool; listeners never share workers
//! - Accept never waits on the pool: the queue is unbounded
//! - A listener that fails to bind or accept ends alone; others keep running

pub mod connection;
pub mod listener;

pub use listener::{Listener, ListenerError, ListenerHandle};
