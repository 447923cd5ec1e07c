//! Hot reload: re-reads the config file whenever it changes on disk.
//!
//! Only configs that load and validate are forwarded; a broken edit is logged
//! and the running configuration stays in place.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::load_config;
use crate::config::schema::Config;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Watches one config file and publishes each valid new version.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    updates: Sender<Config>,
}

impl ConfigWatcher {
    /// The receiver yields every successfully reloaded config, in order.
    pub fn new(path: &Path) -> (Self, Receiver<Config>) {
        let (updates, rx) = mpsc::channel();
        let watcher = Self {
            path: path.to_path_buf(),
            updates,
        };
        (watcher, rx)
    }

    /// Begin watching. Events arrive on notify's thread; keep the returned
    /// watcher alive for as long as updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path;
        let updates = self.updates;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |event: notify::Result<Event>| match event {
                Ok(event) => {
                    reload_on_change(&watched, &event, &updates);
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            NotifyConfig::default().with_poll_interval(POLL_INTERVAL),
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(watcher)
    }
}

/// Returns whether a new config was published.
fn reload_on_change(path: &Path, event: &Event, updates: &Sender<Config>) -> bool {
    if !(event.kind.is_modify() || event.kind.is_create()) {
        return false;
    }

    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), backends = config.backends.len(), "Config reloaded");
            updates.send(config).is_ok()
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Reload failed, keeping current config");
            false
        }
    }
}
