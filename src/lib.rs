//! Layer-7 TCP load balancer library.
//!
//! One balancer listener proxies line-oriented requests to backends chosen
//! by a pluggable routing strategy; any number of local "direct" listeners
//! can stand in as backends. Every listener owns a bounded worker pool.

pub mod config;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod worker;

pub use config::Config;
pub use lifecycle::{Shutdown, Topology};
pub use load_balancer::{BackendId, RoutingStrategy, SharedStrategy};
