//! Wires the directory watch, the registry, and a publish sink together.

use std::path::Path;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::inject;
use crate::registry::{PageRegistry, RegistryBuilder};
use crate::sink::{VirtualModuleSink, VirtualModules};
use crate::watcher::{DirectoryWatch, WatchHandle};

/// A registry running on its own task, fed by a directory watch.
///
/// Events are applied strictly one after another in arrival order.
pub struct RunningRegistry {
    watch: WatchHandle,
    task: JoinHandle<PageRegistry>,
}

impl RunningRegistry {
    /// Start watching the registry's root directory and process events on a
    /// tokio task. Fails with [`RouterError::NoRuntime`] outside a runtime.
    pub fn spawn(mut registry: PageRegistry) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()?;
        let watch = DirectoryWatch::new(
            registry.root_dir().to_path_buf(),
            registry.config().pattern().clone(),
        );
        let (watch, mut events) = watch.start()?;

        let task = runtime.spawn(async move {
            while let Some(event) = events.recv().await {
                let outcome = registry.handle(&event);
                debug!("{} -> {outcome:?}", event.path());
            }
            registry
        });

        Ok(Self { watch, task })
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_watching()
    }

    /// Stop watching, apply the events already delivered, and hand back the
    /// registry in its final state.
    pub async fn stop(self) -> Result<PageRegistry> {
        let Self { mut watch, task } = self;
        watch.stop();
        drop(watch);
        task.await.map_err(|e| {
            error!("Registry task failed: {e}");
            RouterError::from(e)
        })
    }
}

/// Publishes the page list of a directory as an in-memory manifest module.
pub struct FileRouter {
    identifier: String,
    manifest_path: String,
    modules: VirtualModules,
    running: RunningRegistry,
}

impl FileRouter {
    /// Watch `config.root_dir` and publish into a manifest module located in
    /// `build_context`.
    pub fn apply(config: RouterConfig, build_context: &Path) -> Result<Self> {
        Self::apply_with(PageRegistry::builder(config), build_context)
    }

    /// Like [`FileRouter::apply`] with a customised registry builder.
    pub fn apply_with(builder: RegistryBuilder, build_context: &Path) -> Result<Self> {
        let validated = builder.config().validate()?;
        let manifest_path = validated
            .manifest_path(build_context)
            .to_string_lossy()
            .into_owned();

        let modules = VirtualModules::new();
        let registry = builder.build(VirtualModuleSink::new(modules.clone(), &manifest_path))?;
        let identifier = registry.identifier().to_string();
        let running = RunningRegistry::spawn(registry)?;

        info!("Publishing {identifier} to {manifest_path}");
        Ok(Self {
            identifier,
            manifest_path,
            modules,
            running,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn manifest_path(&self) -> &str {
        &self.manifest_path
    }

    pub fn modules(&self) -> &VirtualModules {
        &self.modules
    }

    /// Latest published payload, if any.
    pub fn manifest(&self) -> Option<String> {
        self.modules.contents(&self.manifest_path)
    }

    /// Number of snapshots published so far.
    pub fn revision(&self) -> u64 {
        self.modules.revision(&self.manifest_path)
    }

    /// Substitute references to the identifier in `source` with the latest
    /// snapshot, or an empty list before the first publish.
    pub fn inject(&self, source: &str) -> String {
        let payload = self.manifest().unwrap_or_else(|| "[]".to_string());
        inject::substitute(source, &self.identifier, &payload)
    }

    /// Wait until at least `revision` snapshots have been published.
    /// Returns `false` on timeout.
    pub async fn wait_for_revision(&self, revision: u64, timeout: Duration) -> bool {
        let mut writes = self.modules.subscribe();
        let reached = writes.wait_for(|_| self.revision() >= revision);
        matches!(tokio::time::timeout(timeout, reached).await, Ok(Ok(_)))
    }

    /// Stop watching and return the registry in its final state.
    pub async fn stop(self) -> Result<PageRegistry> {
        self.running.stop().await
    }
}
