//! Shared-workspace watcher.
//!
//! One recursive watcher observes the single shared root; each surviving
//! event is synthesized into a `file_change` message for every active room.
//! Watch handles are never released before process exit (known open issue).

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{
    event::{CreateKind, RemoveKind},
    EventKind, RecursiveMode, Watcher,
};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, warn};

use crate::hub::Hub;

const WATCH_DEBOUNCE: Duration = Duration::from_millis(250);

/// Start watching `root`, fanning changes into the hub. The watch handle
/// lives inside the spawned task for the rest of the process.
pub fn spawn(root: PathBuf, hub: Arc<Hub>) -> Result<()> {
    let (tx, rx) = mpsc::channel(128);

    let mut watcher = notify::recommended_watcher(move |res| {
        if tx.blocking_send(res).is_err() {
            debug!("watch channel closed");
        }
    })
    .context("initializing file watcher")?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching shared directory {}", root.display()))?;

    tokio::spawn(run(watcher, root, rx, hub));
    Ok(())
}

async fn run(
    _watcher: notify::RecommendedWatcher,
    root: PathBuf,
    mut rx: mpsc::Receiver<notify::Result<notify::Event>>,
    hub: Arc<Hub>,
) {
    let mut pending: HashMap<PathBuf, EventKind> = HashMap::new();
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            incoming = rx.recv() => {
                match incoming {
                    Some(Ok(event)) => {
                        for path in event.paths {
                            pending.insert(path, event.kind.clone());
                        }
                        deadline = Some(Instant::now() + WATCH_DEBOUNCE);
                    }
                    Some(Err(err)) => {
                        warn!("watcher error: {:?}", err);
                    }
                    None => {
                        error!("watcher channel closed, shared-fs events stop");
                        break;
                    }
                }
            }
            _ = sleep_until(deadline.unwrap()), if deadline.is_some() => {
                let mut batched = HashMap::new();
                std::mem::swap(&mut batched, &mut pending);
                deadline = None;

                for (path, kind) in batched {
                    let Some(rel) = relative_visible_path(&root, &path) else {
                        continue;
                    };
                    let Some(action) = file_action(&path, &kind).await else {
                        continue;
                    };
                    hub.file_changed(&rel, action).await;
                }
            }
        }
    }
}

/// Root-relative `/`-joined path, or None when the path sits outside the
/// root or any segment is dot-prefixed.
fn relative_visible_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;

    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            let part = part.to_string_lossy();
            if part.starts_with('.') {
                return None;
            }
            parts.push(part.to_string());
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Map an event to a message action, dropping directory events.
async fn file_action(path: &Path, kind: &EventKind) -> Option<&'static str> {
    let is_dir = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_dir(),
        // The path is gone (or unreadable); fall back to what the event
        // kind says it was.
        Err(_) => matches!(
            kind,
            EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder)
        ),
    };
    if is_dir {
        return None;
    }

    match kind {
        EventKind::Create(_) => Some("add"),
        EventKind::Modify(_) => Some("change"),
        EventKind::Remove(_) => Some("delete"),
        _ => None,
    }
}
