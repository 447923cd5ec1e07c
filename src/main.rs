//! l7-balancer
//!
//! ```text
//!   Client ──▶ balancer listener ──▶ worker pool ──▶ RequestForwarder
//!                                                       │ select_server(first line)
//!                                                       ▼
//!                                               RoutingStrategy
//!                                     (consistent hash | least loaded)
//!                                                       │
//!                                                       ▼
//!   Client ◀── response relay ◀──────────── backend (remote, or a local
//!                                            direct-mode listener)
//! ```
//!
//! Usage: `l7-balancer [--config <PATH>] [--watch]`. Without `--config`
//! the built-in topology is used: balancer on port 1003 and ten local
//! servers on 1004..=1013.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use l7_balancer::config::watcher::ConfigWatcher;
use l7_balancer::config::{load_config, Config};
use l7_balancer::lifecycle::reload::spawn_reloader;
use l7_balancer::lifecycle::Topology;
use l7_balancer::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "l7-balancer", version, about = "Layer-7 TCP load balancer")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Re-read the configuration file on change and apply backend membership
    #[arg(short, long, requires = "config")]
    watch: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "l7-balancer starting");

    tracing::info!(
        bind_address = %config.balancer.bind_address,
        workers = config.balancer.workers,
        strategy = ?config.balancer.strategy,
        backends = config.backends.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let topology = Topology::start(&config)?;

    // Both must stay alive for the lifetime of the process.
    let mut _watch = None;
    if let (true, Some(path)) = (cli.watch, &cli.config) {
        let (watcher, updates) = ConfigWatcher::new(path);
        let notify_handle = watcher.run()?;
        let reloader = spawn_reloader(
            topology.strategy().clone(),
            config.clone(),
            topology.aliases().clone(),
            updates,
        )?;
        tracing::info!(path = %path.display(), "Watching configuration for backend changes");
        _watch = Some((notify_handle, reloader));
    }

    topology.wait();

    tracing::info!("Shutdown complete");
    Ok(())
}
