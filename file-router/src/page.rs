//! Pages and the keyed page collection.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One discovered file and its routing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Route derived from `path`.
    pub url: String,

    /// Path relative to the root directory, `/`-separated. Unique key.
    pub path: String,

    /// Root directory joined with `path`.
    pub absolute_path: PathBuf,
}

impl Page {
    pub fn new(root_dir: &Path, path: impl Into<String>, url: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            url: url.into(),
            absolute_path: root_dir.join(&path),
            path,
        }
    }
}

/// Pages keyed by relative path.
///
/// Iteration follows the `Ord` of the key, which for `String` is a byte-wise
/// ordinal comparison. Arrival order of events never leaks into a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCollection {
    pages: BTreeMap<String, Page>,
}

impl PageCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the page keyed by `page.path`. Returns the replaced page.
    pub fn upsert(&mut self, page: Page) -> Option<Page> {
        self.pages.insert(page.path.clone(), page)
    }

    pub fn remove(&mut self, path: &str) -> Option<Page> {
        self.pages.remove(path)
    }

    /// Remove every page under the directory `dir` (relative, no trailing
    /// slash). Returns the removed pages in path order.
    pub fn remove_dir(&mut self, dir: &str) -> Vec<Page> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let keys: Vec<String> = self
            .pages
            .range(prefix.clone()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(&prefix))
            .cloned()
            .collect();
        keys.iter().filter_map(|key| self.pages.remove(key)).collect()
    }

    pub fn get(&self, path: &str) -> Option<&Page> {
        self.pages.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.pages.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Pages sorted ascending by path.
    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    pub fn to_vec(&self) -> Vec<Page> {
        self.iter().cloned().collect()
    }
}

impl FromIterator<Page> for PageCollection {
    fn from_iter<I: IntoIterator<Item = Page>>(iter: I) -> Self {
        let mut collection = Self::new();
        for page in iter {
            collection.upsert(page);
        }
        collection
    }
}

/// Encode an ordered snapshot as a JSON array of `{url, path, absolutePath}`.
pub fn serialize_pages(pages: &[Page]) -> serde_json::Result<String> {
    serde_json::to_string(pages)
}

/// Decode a payload produced by [`serialize_pages`].
pub fn deserialize_pages(payload: &str) -> serde_json::Result<Vec<Page>> {
    serde_json::from_str(payload)
}
