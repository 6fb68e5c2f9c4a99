//! The page registry: applies path events and publishes snapshots.

use std::path::Path;

use tracing::{debug, error, warn};

use crate::config::{RouterConfig, ValidatedConfig};
use crate::error::{EventError, PublishError, Result};
use crate::exclude::{ExcludeSet, PathPredicate};
use crate::page::{Page, PageCollection, serialize_pages};
use crate::sink::PublishSink;
use crate::url::{DefaultUrlTransform, UrlTransform};

/// A create/delete notification for a path relative to the root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathEvent {
    Added(String),
    Removed(String),

    /// A directory left the tree (deleted or moved out). Every page under it
    /// goes away in one change.
    RemovedDir(String),
}

impl PathEvent {
    pub fn path(&self) -> &str {
        match self {
            Self::Added(path) | Self::Removed(path) | Self::RemovedDir(path) => path,
        }
    }
}

/// What an event did to the registry.
#[derive(Debug)]
pub enum EventOutcome {
    /// The collection changed and the new snapshot was published.
    Published,

    /// The collection changed but the sink refused the snapshot.
    PublishFailed(PublishError),

    /// The path matched an exclusion predicate.
    Excluded,

    /// Nothing to do: the removed path was not known.
    Unchanged,

    /// The event could not be applied. Prior state is kept.
    Rejected(EventError),
}

impl EventOutcome {
    /// Whether the collection was modified by the event.
    pub fn changed_state(&self) -> bool {
        matches!(self, Self::Published | Self::PublishFailed(_))
    }
}

/// Builds a [`PageRegistry`] from a [`RouterConfig`] plus optional collaborators.
pub struct RegistryBuilder {
    config: RouterConfig,
    transform: Box<dyn UrlTransform>,
    extra_excludes: ExcludeSet,
}

impl RegistryBuilder {
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Use a custom path-to-url transform.
    pub fn transform(mut self, transform: impl UrlTransform + 'static) -> Self {
        self.transform = Box::new(transform);
        self
    }

    /// Add an exclusion predicate on top of the configured expressions.
    pub fn exclude_with(mut self, predicate: impl PathPredicate + 'static) -> Self {
        self.extra_excludes.push(predicate);
        self
    }

    /// Validate the configuration and build the registry. Fails fast on a
    /// missing or relative root directory and on unparsable matchers.
    pub fn build(self, sink: impl PublishSink + 'static) -> Result<PageRegistry> {
        let config = self.config.validate()?;

        let mut exclude = ExcludeSet::new();
        for regex in config.exclude() {
            exclude.push(regex.clone());
        }
        for predicate in self.extra_excludes.into_predicates() {
            exclude.push_boxed(predicate);
        }

        Ok(PageRegistry {
            config,
            exclude,
            transform: self.transform,
            sink: Box::new(sink),
            pages: PageCollection::new(),
        })
    }
}

/// Owns the page collection for one root directory.
///
/// Events are applied one at a time, to completion: mutate, serialize,
/// publish. Handlers never return errors; failures are logged and reported
/// through [`EventOutcome`].
pub struct PageRegistry {
    config: ValidatedConfig,
    exclude: ExcludeSet,
    transform: Box<dyn UrlTransform>,
    sink: Box<dyn PublishSink>,
    pages: PageCollection,
}

impl PageRegistry {
    pub fn builder(config: RouterConfig) -> RegistryBuilder {
        RegistryBuilder {
            config,
            transform: Box::new(DefaultUrlTransform),
            extra_excludes: ExcludeSet::new(),
        }
    }

    /// Build a registry with the default url transform.
    pub fn new(config: RouterConfig, sink: impl PublishSink + 'static) -> Result<Self> {
        Self::builder(config).build(sink)
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    pub fn root_dir(&self) -> &Path {
        self.config.root_dir()
    }

    /// Identifier the snapshot is published under.
    pub fn identifier(&self) -> &str {
        self.config.variable_name()
    }

    pub fn pages(&self) -> &PageCollection {
        &self.pages
    }

    pub fn handle(&mut self, event: &PathEvent) -> EventOutcome {
        match event {
            PathEvent::Added(path) => self.on_path_added(path),
            PathEvent::Removed(path) => self.on_path_removed(path),
            PathEvent::RemovedDir(dir) => self.on_dir_removed(dir),
        }
    }

    pub fn on_path_added(&mut self, relative_path: &str) -> EventOutcome {
        match self.exclude.is_excluded(relative_path) {
            Ok(true) => return EventOutcome::Excluded,
            Ok(false) => {}
            Err(e) => {
                warn!("Ignoring added path {relative_path}: {e}");
                return EventOutcome::Rejected(e.into());
            }
        }

        let url = match self.transform.to_url(relative_path) {
            Ok(url) => url,
            Err(e) => {
                warn!("Ignoring added path {relative_path}: {e}");
                return EventOutcome::Rejected(e.into());
            }
        };

        let page = Page::new(self.config.root_dir(), relative_path, url);
        if self.pages.upsert(page).is_some() {
            debug!("Page replaced: {relative_path}");
        } else {
            debug!("Page added: {relative_path}");
        }

        self.publish()
    }

    pub fn on_path_removed(&mut self, relative_path: &str) -> EventOutcome {
        match self.exclude.is_excluded(relative_path) {
            Ok(true) => return EventOutcome::Excluded,
            Ok(false) => {}
            Err(e) => {
                warn!("Ignoring removed path {relative_path}: {e}");
                return EventOutcome::Rejected(e.into());
            }
        }

        if self.pages.remove(relative_path).is_none() {
            debug!("Removed path was not a known page: {relative_path}");
            return EventOutcome::Unchanged;
        }

        debug!("Page removed: {relative_path}");
        self.publish()
    }

    /// Drop every page under `relative_dir`, publishing once if any existed.
    /// Pages in the collection already passed exclusion, so none is checked.
    pub fn on_dir_removed(&mut self, relative_dir: &str) -> EventOutcome {
        let removed = self.pages.remove_dir(relative_dir);
        if removed.is_empty() {
            debug!("Removed directory held no pages: {relative_dir}");
            return EventOutcome::Unchanged;
        }

        debug!("Directory removed: {relative_dir} ({} pages)", removed.len());
        self.publish()
    }

    /// All current pages, ascending by path.
    pub fn snapshot(&self) -> Vec<Page> {
        self.pages.to_vec()
    }

    pub fn serialize(&self) -> serde_json::Result<String> {
        serialize_pages(&self.snapshot())
    }

    fn publish(&mut self) -> EventOutcome {
        let result = self
            .serialize()
            .map_err(PublishError::from)
            .and_then(|payload| self.sink.publish(self.config.variable_name(), &payload));

        match result {
            Ok(()) => EventOutcome::Published,
            Err(e) => {
                error!(
                    "Failed to publish {} ({} pages): {e}",
                    self.config.variable_name(),
                    self.pages.len()
                );
                EventOutcome::PublishFailed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use crate::exclude::FnPredicate;
    use crate::page::deserialize_pages;
    use crate::sink::RecordingSink;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tracing_test::traced_test;

    fn root() -> PathBuf {
        std::env::temp_dir().join("pages")
    }

    fn registry(config: RouterConfig) -> (PageRegistry, RecordingSink) {
        let sink = RecordingSink::new();
        let registry = PageRegistry::new(config, sink.clone()).unwrap();
        (registry, sink)
    }

    fn paths(registry: &PageRegistry) -> Vec<String> {
        registry.snapshot().into_iter().map(|p| p.path).collect()
    }

    struct FailingSink;

    impl PublishSink for FailingSink {
        fn publish(&mut self, _: &str, _: &str) -> std::result::Result<(), PublishError> {
            Err(PublishError::Poisoned)
        }
    }

    #[test]
    fn test_snapshot_is_sorted_regardless_of_arrival() {
        let (mut registry, _) = registry(RouterConfig::new(root()));

        registry.on_path_added("b.js");
        registry.on_path_added("a.js");
        registry.on_path_added("c/index.js");

        assert_eq!(paths(&registry), vec!["a.js", "b.js", "c/index.js"]);
    }

    #[test]
    fn test_page_fields() {
        let (mut registry, _) = registry(RouterConfig::new(root()));

        registry.on_path_added("01-first.js");

        assert_eq!(
            registry.snapshot(),
            vec![Page {
                url: "/01-first/".to_string(),
                path: "01-first.js".to_string(),
                absolute_path: root().join("01-first.js"),
            }]
        );
    }

    #[test]
    fn test_duplicate_add_keeps_single_entry() {
        let (mut registry, sink) = registry(RouterConfig::new(root()));

        registry.on_path_added("a.js");
        let once = registry.snapshot();
        registry.on_path_added("a.js");

        assert_eq!(registry.snapshot(), once);
        assert_eq!(registry.pages().len(), 1);
        assert_eq!(sink.count(), 2);
    }

    #[test]
    fn test_duplicate_add_recomputes_fields() {
        let counter = std::sync::Mutex::new(0u8);
        let transform = move |path: &str| -> std::result::Result<String, TransformError> {
            let mut n = counter.lock().map_err(|_| TransformError::EmptyPath)?;
            *n += 1;
            Ok(format!("/{path}/{n}"))
        };
        let mut registry = PageRegistry::builder(RouterConfig::new(root()))
            .transform(transform)
            .build(RecordingSink::new())
            .unwrap();

        registry.on_path_added("a.js");
        registry.on_path_added("a.js");

        assert_eq!(registry.pages().len(), 1);
        assert_eq!(
            registry.pages().get("a.js").map(|p| p.url.as_str()),
            Some("/a.js/2")
        );
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let (mut registry, sink) = registry(RouterConfig::new(root()));
        registry.on_path_added("a.js");
        let before = registry.snapshot();

        let outcome = registry.on_path_removed("missing.js");

        assert!(matches!(outcome, EventOutcome::Unchanged));
        assert_eq!(registry.snapshot(), before);
        assert_eq!(sink.count(), 1);
    }

    #[test]
    fn test_remove_publishes_remaining_pages() {
        let (mut registry, sink) = registry(RouterConfig::new(root()));
        registry.on_path_added("01-first.js");
        registry.on_path_added("02-second.js");

        let outcome = registry.on_path_removed("01-first.js");

        assert!(matches!(outcome, EventOutcome::Published));
        assert_eq!(paths(&registry), vec!["02-second.js"]);
        assert_eq!(sink.count(), 3);

        let (identifier, payload) = sink.published().pop().unwrap();
        assert_eq!(identifier, "ROUTES");
        assert_eq!(deserialize_pages(&payload).unwrap(), registry.snapshot());
    }

    #[test]
    fn test_delete_then_add_applies_in_order() {
        let (mut registry, sink) = registry(RouterConfig::new(root()));
        registry.on_path_added("a.js");

        registry.handle(&PathEvent::Removed("a.js".into()));
        registry.handle(&PathEvent::Added("a.js".into()));

        assert_eq!(paths(&registry), vec!["a.js"]);
        let (_, last) = sink.published().pop().unwrap();
        assert_eq!(deserialize_pages(&last).unwrap().len(), 1);
    }

    #[test]
    fn test_dir_removal_publishes_once() {
        let (mut registry, sink) = registry(RouterConfig::new(root()));
        for path in ["blog.js", "blog/a.js", "blog/nested/b.js"] {
            registry.on_path_added(path);
        }

        let outcome = registry.handle(&PathEvent::RemovedDir("blog".into()));

        assert!(matches!(outcome, EventOutcome::Published));
        assert_eq!(paths(&registry), vec!["blog.js"]);
        assert_eq!(sink.count(), 4);
        let (_, last) = sink.published().pop().unwrap();
        assert_eq!(deserialize_pages(&last).unwrap(), registry.snapshot());
    }

    #[test]
    fn test_dir_removal_without_pages_is_noop() {
        let (mut registry, sink) = registry(RouterConfig::new(root()));
        registry.on_path_added("a.js");

        let outcome = registry.on_dir_removed("assets");

        assert!(matches!(outcome, EventOutcome::Unchanged));
        assert_eq!(sink.count(), 1);
    }

    #[test]
    fn test_excluded_paths_are_ignored() {
        let (mut registry, sink) = registry(RouterConfig::new(root()).exclude("^_draft"));

        assert!(matches!(
            registry.on_path_added("_draft-note.js"),
            EventOutcome::Excluded
        ));
        assert!(matches!(
            registry.on_path_removed("_draft-note.js"),
            EventOutcome::Excluded
        ));

        assert!(registry.snapshot().is_empty());
        assert_eq!(sink.count(), 0);
    }

    #[test]
    #[traced_test]
    fn test_failing_predicate_rejects_event() {
        let sink = RecordingSink::new();
        let mut registry = PageRegistry::builder(RouterConfig::new(root()))
            .exclude_with(FnPredicate::new("flaky", |path: &str| {
                if path.starts_with("bad") {
                    Err("lookup failed".to_string())
                } else {
                    Ok(false)
                }
            }))
            .build(sink.clone())
            .unwrap();
        registry.on_path_added("good.js");

        let outcome = registry.on_path_added("bad.js");

        assert!(matches!(
            outcome,
            EventOutcome::Rejected(EventError::Exclusion(_))
        ));
        assert_eq!(paths(&registry), vec!["good.js"]);
        assert_eq!(sink.count(), 1);
        assert!(logs_contain("Ignoring added path bad.js"));
    }

    #[test]
    fn test_transform_error_rejects_only_that_path() {
        let (mut registry, sink) = registry(RouterConfig::new(root()));
        registry.on_path_added("a.js");

        let outcome = registry.on_path_added("../escape.js");

        assert!(matches!(
            outcome,
            EventOutcome::Rejected(EventError::Transform(TransformError::ParentTraversal(_)))
        ));
        assert_eq!(paths(&registry), vec!["a.js"]);
        assert_eq!(sink.count(), 1);
    }

    #[test]
    #[traced_test]
    fn test_publish_failure_keeps_new_state() {
        let mut registry = PageRegistry::new(RouterConfig::new(root()), FailingSink).unwrap();

        let outcome = registry.on_path_added("a.js");
        assert!(outcome.changed_state());
        assert!(matches!(outcome, EventOutcome::PublishFailed(_)));

        registry.on_path_added("b.js");
        assert_eq!(paths(&registry), vec!["a.js", "b.js"]);
        assert!(logs_contain("Failed to publish ROUTES"));
    }

    #[test]
    fn test_missing_root_dir_fails_at_construction() {
        let result = PageRegistry::new(RouterConfig::default(), RecordingSink::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_identifier() {
        let (mut registry, sink) = registry(RouterConfig::new(root()).with_variable_name("PAGES"));

        registry.on_path_added("a.js");

        assert_eq!(registry.identifier(), "PAGES");
        assert_eq!(sink.published()[0].0, "PAGES");
    }

    #[test]
    fn test_serialize_round_trip() {
        let (mut registry, _) = registry(RouterConfig::new(root()));
        for path in ["z.js", "blog/index.js", "a.jsx"] {
            registry.on_path_added(path);
        }

        let payload = registry.serialize().unwrap();

        assert_eq!(deserialize_pages(&payload).unwrap(), registry.snapshot());
    }
}
