//! Directory watching: turns notify events into relative [`PathEvent`]s.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use globset::GlobMatcher;
use notify::event::{ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, RouterError};
use crate::registry::PathEvent;

/// Watches a root directory for files matching a pattern.
///
/// Existing files are reported as [`PathEvent::Added`] before any live
/// event. Events are delivered in the order notify reports them. A
/// directory moved into the tree yields an add per matching file inside it;
/// one moved out or deleted yields a [`PathEvent::RemovedDir`].
pub struct DirectoryWatch {
    root_dir: PathBuf,
    pattern: GlobMatcher,
}

/// Keeps the underlying watcher alive. Dropping it stops the watch and ends
/// the event stream once pending events are drained.
pub struct WatchHandle {
    root_dir: PathBuf,
    watcher: Option<RecommendedWatcher>,
}

impl WatchHandle {
    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Stop watching. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.root_dir) {
                debug!("Unwatch {} failed: {e}", self.root_dir.display());
            }
            info!("Stopped watching {}", self.root_dir.display());
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Shared sender for scan and live events. While the scan holds the gate,
/// live events wait, so they always land after the scan's adds.
#[derive(Clone)]
struct Forwarder {
    tx: Arc<Mutex<mpsc::UnboundedSender<PathEvent>>>,
}

impl Forwarder {
    fn new(tx: mpsc::UnboundedSender<PathEvent>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(tx)),
        }
    }

    fn hold(&self) -> MutexGuard<'_, mpsc::UnboundedSender<PathEvent>> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send `events` in order. Returns `false` once the receiver is gone.
    fn forward(&self, events: Vec<PathEvent>) -> bool {
        let tx = self.hold();
        events.into_iter().all(|event| tx.send(event).is_ok())
    }
}

impl DirectoryWatch {
    pub fn new(root_dir: impl Into<PathBuf>, pattern: GlobMatcher) -> Self {
        Self {
            root_dir: root_dir.into(),
            pattern,
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Start watching the directory recursively, then scan it.
    pub fn start(self) -> Result<(WatchHandle, mpsc::UnboundedReceiver<PathEvent>)> {
        if !self.root_dir.is_dir() {
            return Err(RouterError::DirectoryNotFound(self.root_dir.clone()));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let forwarder = Forwarder::new(event_tx);

        // notify may report canonical paths (e.g. /private/var on macOS)
        let mut roots = vec![self.root_dir.clone()];
        if let Ok(canonical) = self.root_dir.canonicalize() {
            if canonical != self.root_dir {
                roots.push(canonical);
            }
        }
        let pattern = self.pattern.clone();
        let live = forwarder.clone();

        // Register before scanning so nothing created in between is missed;
        // a file seen by both is a duplicate add, which the registry absorbs.
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    let events = map_event(&roots, &pattern, event);
                    if !events.is_empty() && !live.forward(events) {
                        debug!("Dropping event, receiver closed");
                    }
                }
                Err(e) => error!("Watch error: {e}"),
            },
        )?;
        watcher.watch(&self.root_dir, RecursiveMode::Recursive)?;

        let gate = forwarder.hold();
        let mut initial = 0usize;
        for path_event in scan(&self.root_dir, &self.root_dir, &self.pattern) {
            if gate.send(path_event).is_err() {
                break;
            }
            initial += 1;
        }
        drop(gate);
        info!(
            "Watching {} ({initial} existing files)",
            self.root_dir.display()
        );

        Ok((
            WatchHandle {
                root_dir: self.root_dir,
                watcher: Some(watcher),
            },
            event_rx,
        ))
    }
}

/// Matching files under `dir`, relative to `root_dir`, sorted by path.
fn scan(root_dir: &Path, dir: &Path, pattern: &GlobMatcher) -> Vec<PathEvent> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| relative_match(root_dir, pattern, entry.path()))
        .map(PathEvent::Added)
        .collect()
}

fn map_event(roots: &[PathBuf], pattern: &GlobMatcher, event: notify::Event) -> Vec<PathEvent> {
    let mut events = Vec::new();

    match event.kind {
        EventKind::Create(_) => {
            for path in &event.paths {
                events.extend(added(roots, pattern, path));
            }
        }
        EventKind::Remove(kind) => {
            events.extend(
                event
                    .paths
                    .iter()
                    .filter_map(|path| removed(roots, pattern, path, kind)),
            );
        }
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => {
                events.extend(
                    event
                        .paths
                        .iter()
                        .filter_map(|path| removed(roots, pattern, path, RemoveKind::Any)),
                );
            }
            RenameMode::To => {
                for path in &event.paths {
                    events.extend(added(roots, pattern, path));
                }
            }
            RenameMode::Both => {
                if let [from, to, ..] = event.paths.as_slice() {
                    events.extend(removed(roots, pattern, from, RemoveKind::Any));
                    events.extend(added(roots, pattern, to));
                }
            }
            // Without a direction, trust the file system.
            _ => {
                for path in &event.paths {
                    if path.exists() {
                        events.extend(added(roots, pattern, path));
                    } else {
                        events.extend(removed(roots, pattern, path, RemoveKind::Any));
                    }
                }
            }
        },
        _ => {}
    }

    events
}

/// Adds for a created path: the file itself, or every matching file when it
/// is a directory.
fn added(roots: &[PathBuf], pattern: &GlobMatcher, path: &Path) -> Vec<PathEvent> {
    let Some(root) = roots.iter().find(|root| path.starts_with(root)) else {
        return Vec::new();
    };
    if path.is_dir() {
        return scan(root, path, pattern);
    }
    relative_match(root, pattern, path)
        .map(PathEvent::Added)
        .into_iter()
        .collect()
}

/// The removal of a path that no longer exists. A path that could be a
/// directory and does not match the pattern becomes a directory removal.
fn removed(
    roots: &[PathBuf],
    pattern: &GlobMatcher,
    path: &Path,
    kind: RemoveKind,
) -> Option<PathEvent> {
    let relative = roots.iter().find_map(|root| relative_path(root, path))?;
    match kind {
        RemoveKind::Folder => Some(PathEvent::RemovedDir(relative)),
        _ if pattern.is_match(&relative) => Some(PathEvent::Removed(relative)),
        RemoveKind::File => None,
        _ => Some(PathEvent::RemovedDir(relative)),
    }
}

/// `path` relative to `root_dir` with `/` separators. `None` outside the
/// root and for the root itself.
fn relative_path(root_dir: &Path, path: &Path) -> Option<String> {
    let relative = path
        .strip_prefix(root_dir)
        .ok()?
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    (!relative.is_empty()).then_some(relative)
}

/// `path` relative to `root_dir` with `/` separators, if it matches `pattern`.
fn relative_match(root_dir: &Path, pattern: &GlobMatcher, path: &Path) -> Option<String> {
    relative_path(root_dir, path).filter(|relative| pattern.is_match(relative))
}
