//! Downstream sinks receiving published snapshots.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

use crate::error::PublishError;

/// Receives the full serialized snapshot after every registry change.
pub trait PublishSink: Send {
    fn publish(&mut self, identifier: &str, payload: &str) -> Result<(), PublishError>;
}

/// A module held in memory by [`VirtualModules`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualModule {
    pub contents: String,

    /// How many times the module has been written.
    pub revision: u64,

    pub updated_at: DateTime<Utc>,
}

/// In-memory module store, keyed by module path.
///
/// Clones share the same store, so the publishing side can be handed to a
/// registry while a reader keeps another handle.
#[derive(Debug, Clone)]
pub struct VirtualModules {
    modules: Arc<RwLock<HashMap<String, VirtualModule>>>,

    /// Total writes across all modules.
    writes: Arc<watch::Sender<u64>>,
}

impl Default for VirtualModules {
    fn default() -> Self {
        let (writes, _) = watch::channel(0);
        Self {
            modules: Arc::default(),
            writes: Arc::new(writes),
        }
    }
}

impl VirtualModules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notified after every write to any module.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.writes.subscribe()
    }

    /// Create or overwrite the module at `path`.
    pub fn write_module(&self, path: &str, contents: &str) -> Result<u64, PublishError> {
        let mut modules = self.modules.write().map_err(|_| PublishError::Poisoned)?;
        let module = modules
            .entry(path.to_string())
            .or_insert_with(|| VirtualModule {
                contents: String::new(),
                revision: 0,
                updated_at: Utc::now(),
            });
        module.contents = contents.to_string();
        module.revision += 1;
        module.updated_at = Utc::now();
        let revision = module.revision;
        drop(modules);

        self.writes.send_modify(|writes| *writes += 1);
        Ok(revision)
    }

    pub fn get(&self, path: &str) -> Option<VirtualModule> {
        self.modules.read().ok()?.get(path).cloned()
    }

    pub fn contents(&self, path: &str) -> Option<String> {
        self.get(path).map(|module| module.contents)
    }

    pub fn revision(&self, path: &str) -> u64 {
        self.get(path).map_or(0, |module| module.revision)
    }
}

/// Publishes into a [`VirtualModules`] store at a fixed module path,
/// regardless of the identifier.
#[derive(Debug, Clone)]
pub struct VirtualModuleSink {
    modules: VirtualModules,
    module_path: String,
}

impl VirtualModuleSink {
    pub fn new(modules: VirtualModules, module_path: impl Into<String>) -> Self {
        Self {
            modules,
            module_path: module_path.into(),
        }
    }

    pub fn module_path(&self) -> &str {
        &self.module_path
    }
}

impl PublishSink for VirtualModuleSink {
    fn publish(&mut self, identifier: &str, payload: &str) -> Result<(), PublishError> {
        let revision = self.modules.write_module(&self.module_path, payload)?;
        debug!(
            "Wrote virtual module {} for {identifier} (revision {revision})",
            self.module_path
        );
        Ok(())
    }
}

/// Writes each snapshot to a file on disk, replacing it atomically.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
}

impl ManifestFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl PublishSink for ManifestFile {
    fn publish(&mut self, identifier: &str, payload: &str) -> Result<(), PublishError> {
        let write_err = |source| PublishError::Write {
            identifier: identifier.to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let temp = self.temp_path();
        fs::write(&temp, payload).map_err(write_err)?;
        fs::rename(&temp, &self.path).map_err(write_err)?;

        debug!("Wrote manifest {} for {identifier}", self.path.display());
        Ok(())
    }
}

/// Records every publish. Useful for hosts that want to observe the stream.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    published: Arc<RwLock<Vec<(String, String)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(identifier, payload)` pairs published so far, oldest first.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published
            .read()
            .map(|published| published.to_vec())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.published.read().map_or(0, |published| published.len())
    }
}

impl PublishSink for RecordingSink {
    fn publish(&mut self, identifier: &str, payload: &str) -> Result<(), PublishError> {
        self.published
            .write()
            .map_err(|_| PublishError::Poisoned)?
            .push((identifier.to_string(), payload.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_virtual_module_revisions() {
        let modules = VirtualModules::new();
        let mut sink = VirtualModuleSink::new(modules.clone(), "/app/manifest.json");

        sink.publish("ROUTES", "[]").unwrap();
        sink.publish("ROUTES", "[1]").unwrap();

        assert_eq!(modules.contents("/app/manifest.json").as_deref(), Some("[1]"));
        assert_eq!(modules.revision("/app/manifest.json"), 2);
        assert_eq!(modules.revision("/app/other.json"), 0);
    }

    #[test]
    fn test_writes_are_broadcast() {
        let modules = VirtualModules::new();
        let mut writes = modules.subscribe();
        assert!(!writes.has_changed().unwrap());

        modules.write_module("/app/a.json", "[]").unwrap();
        modules.write_module("/app/b.json", "[]").unwrap();

        assert!(writes.has_changed().unwrap());
        assert_eq!(*writes.borrow_and_update(), 2);
    }

    #[test]
    fn test_manifest_file_is_replaced() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out/manifest.json");
        let mut sink = ManifestFile::new(&path);

        sink.publish("ROUTES", "[]").unwrap();
        sink.publish("ROUTES", r#"[{"path":"a.js"}]"#).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), r#"[{"path":"a.js"}]"#);
        assert!(!temp_dir.path().join("out/manifest.json.tmp").exists());
    }

    #[test]
    fn test_recording_sink_shares_state() {
        let sink = RecordingSink::new();
        let mut writer = sink.clone();

        writer.publish("PAGES", "[]").unwrap();

        assert_eq!(sink.published(), vec![("PAGES".to_string(), "[]".to_string())]);
    }
}
