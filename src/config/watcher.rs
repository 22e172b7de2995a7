//! Config file watcher with debounced hot reload
//!
//! Editors often emit several modify events for one save. Events are
//! coalesced until the file has been quiet for [`DEBOUNCE`], the file is
//! loaded once, and a config is only passed on when it differs from the
//! last one delivered.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::AppConfig;

/// Quiet period after the last file event before reloading
pub const DEBOUNCE: Duration = Duration::from_millis(200);

pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<AppConfig>,
}

impl ConfigWatcher {
    /// Load `config_path` and start watching it
    pub async fn new(config_path: String) -> Result<(Self, Arc<AppConfig>)> {
        let initial_config = AppConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (tx, rx) = mpsc::channel(4);

        // Runs on notify's own thread; only signals the reload task
        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                    trace!("Config file event: {:?}", event.kind);
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => error!("Watch error: {}", e),
            })?;

        watcher
            .watch(Path::new(&config_path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path))?;

        tokio::spawn(reload_loop(
            config_path.clone(),
            event_rx,
            tx,
            initial_config.clone(),
            DEBOUNCE,
        ));
        info!("👀 Watching {} for changes", config_path);

        Ok((Self { _watcher: watcher, rx }, Arc::new(initial_config)))
    }

    /// Next changed config; None once the watcher is gone
    pub async fn next_config(&mut self) -> Option<AppConfig> {
        self.rx.recv().await
    }
}

/// Turn each burst of file events into at most one delivered config
async fn reload_loop(
    path: String,
    mut events: mpsc::UnboundedReceiver<()>,
    tx: mpsc::Sender<AppConfig>,
    mut current: AppConfig,
    debounce: Duration,
) {
    while events.recv().await.is_some() {
        let mut coalesced = 1usize;
        while let Ok(Some(())) = tokio::time::timeout(debounce, events.recv()).await {
            coalesced += 1;
        }

        match AppConfig::load(&path).await {
            Ok(config) if config == current => {
                debug!("Config file touched without changes ({} events)", coalesced);
            }
            Ok(config) => {
                debug!("Config reload after {} file events", coalesced);
                current = config.clone();
                if tx.send(config).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("Failed to reload config (keeping old config): {:#}", e);
            }
        }
    }
}
