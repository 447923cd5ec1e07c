//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → build strategy → start local backends → register identities
//!     → start balancer listener
//!
//! Reload (reload.rs):
//!     New config → diff backend identities → add/remove on the live strategy
//!
//! Shutdown (shutdown.rs):
//!     stop flag → listeners stop accepting → pools drain
//! ```
//!
//! # Design Decisions
//! - A bad routing strategy config fails startup; a failed bind does not
//! - Backends start before the balancer so first requests find them up

pub mod reload;
pub mod shutdown;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{StartupError, Topology};
