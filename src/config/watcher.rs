//! Site tree watcher for hot reload.
//!
//! File events under the site root are mapped to the bundle directory they
//! belong to. After a quiet period each touched bundle is reloaded, loaded
//! for the first time, or cleaned up if its directory is gone.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::sites::SiteRegistry;

/// A watcher that monitors the site root for changes.
pub struct SiteWatcher {
    roots: Vec<PathBuf>,
    update_tx: mpsc::UnboundedSender<String>,
}

impl SiteWatcher {
    /// Create a new SiteWatcher.
    ///
    /// Returns the watcher and a receiver of changed bundle names.
    pub fn new(root: &Path) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        let mut roots = vec![root.to_path_buf()];
        if let Ok(canonical) = root.canonicalize() {
            if canonical != root {
                roots.push(canonical);
            }
        }

        (Self { roots, update_tx }, update_rx)
    }

    /// Start watching the tree in a background thread.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let roots = self.roots.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove()) {
                        return;
                    }
                    for path in &event.paths {
                        if let Some(name) = bundle_of(&roots, path) {
                            let _ = tx.send(name);
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.roots[0], RecursiveMode::Recursive)?;

        tracing::info!(path = ?self.roots[0], "Site watcher started");
        Ok(watcher)
    }
}

/// Name of the bundle directory that `path` lives in.
fn bundle_of(roots: &[PathBuf], path: &Path) -> Option<String> {
    let relative = roots.iter().find_map(|root| path.strip_prefix(root).ok())?;
    match relative.components().next()? {
        Component::Normal(name) => name.to_str().map(str::to_string),
        _ => None,
    }
}

/// Bring one bundle in line with what is on disk.
pub fn sync_bundle(registry: &SiteRegistry, name: &str) {
    if registry.root().join(name).is_dir() {
        match registry.load_bundle(name) {
            Ok(bundle) => tracing::info!(bundle = %name, routes = bundle.routes.len(), "Site reloaded after change"),
            Err(e) => tracing::error!(bundle = %name, error = %e, "Failed to reload site. Keeping current configuration."),
        }
    } else if registry.cleanup(name).is_some() {
        tracing::info!(bundle = %name, "Site directory removed");
    }
}

/// Consume change notifications until shutdown, reloading debounced batches.
pub async fn apply_changes(
    registry: Arc<SiteRegistry>,
    mut updates: mpsc::UnboundedReceiver<String>,
    debounce: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let first = tokio::select! {
            name = updates.recv() => match name {
                Some(name) => name,
                None => break,
            },
            _ = shutdown.recv() => break,
        };

        let mut pending = HashSet::from([first]);
        tokio::time::sleep(debounce).await;
        while let Ok(name) = updates.try_recv() {
            pending.insert(name);
        }

        let registry = registry.clone();
        let reload = tokio::task::spawn_blocking(move || {
            for name in pending {
                sync_bundle(&registry, &name);
            }
        });
        if let Err(e) = reload.await {
            tracing::error!(error = %e, "Site reload task failed");
        }
    }
    tracing::debug!("Site watcher loop exiting");
}
