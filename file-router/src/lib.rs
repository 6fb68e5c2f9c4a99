//! # File Router
//!
//! Keeps an alphabetically ordered list of pages derived from the files
//! under a root directory, and republishes it as a virtual manifest module
//! whenever the file set changes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         File Router                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  DirectoryWatch ──► PathEvent ──► PageRegistry ──► PublishSink │
//! │       │                              │                 │        │
//! │       ▼                              ▼                 ▼        │
//! │  initial scan               ExcludeSet, UrlTransform  manifest │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```no_run
//! # async fn run() -> file_router::Result<()> {
//! use file_router::{FileRouter, RouterConfig};
//!
//! let config = RouterConfig::new("/srv/site/pages").exclude("^_draft");
//! let router = FileRouter::apply(config, std::path::Path::new("/srv/site"))?;
//! let bundled = router.inject("export const routes = ROUTES");
//! # let _ = bundled;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod exclude;
pub mod inject;
pub mod page;
pub mod plugin;
pub mod registry;
pub mod sink;
pub mod url;
pub mod watcher;

pub use config::{RouterConfig, ValidatedConfig};
pub use error::{
    ConfigError, EventError, PredicateError, PublishError, Result, RouterError, TransformError,
};
pub use exclude::{ExcludeSet, FnPredicate, PathPredicate};
pub use page::{Page, PageCollection, deserialize_pages, serialize_pages};
pub use plugin::{FileRouter, RunningRegistry};
pub use registry::{EventOutcome, PageRegistry, PathEvent, RegistryBuilder};
pub use sink::{ManifestFile, PublishSink, RecordingSink, VirtualModuleSink, VirtualModules};
pub use url::{DefaultUrlTransform, UrlTransform};
pub use watcher::{DirectoryWatch, WatchHandle};
