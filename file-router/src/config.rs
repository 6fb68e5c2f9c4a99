//! Configuration for a file router.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default glob selecting watched files.
pub const DEFAULT_PATTERN: &str = "**/*.{js,jsx}";

/// Default identifier the snapshot is exposed under.
pub const DEFAULT_VARIABLE_NAME: &str = "ROUTES";

/// Default file name of the manifest module, relative to the build context.
pub const DEFAULT_MANIFEST_NAME: &str = "manifest.json";

/// Configuration for one watched pages directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterConfig {
    /// Absolute path of the pages directory. Required.
    pub root_dir: Option<PathBuf>,

    /// Glob selecting watched files, relative to `root_dir`.
    pub pattern: String,

    /// Regular expressions; a relative path matching any of them is ignored.
    pub exclude: Vec<String>,

    /// Identifier the serialized snapshot is published and injected under.
    pub variable_name: String,

    /// File name of the manifest module inside the build context.
    pub manifest_name: String,
}

impl RouterConfig {
    /// Create a config for the given root directory with default options.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: Some(root_dir.into()),
            ..Self::default()
        }
    }

    /// Set the watched file pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Add an exclude expression.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Set the identifier the snapshot is exposed under.
    pub fn with_variable_name(mut self, name: impl Into<String>) -> Self {
        self.variable_name = name.into();
        self
    }

    /// Set the manifest module file name.
    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    /// Check the configuration and compile its matchers.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let root_dir = self.root_dir.as_ref().ok_or(ConfigError::MissingRootDir)?;
        if !root_dir.is_absolute() {
            return Err(ConfigError::RelativeRootDir(root_dir.clone()));
        }

        if self.variable_name.trim().is_empty() {
            return Err(ConfigError::EmptyVariableName);
        }

        let pattern = Glob::new(&self.pattern)
            .map_err(|source| ConfigError::InvalidPattern {
                pattern: self.pattern.clone(),
                source,
            })?
            .compile_matcher();

        let exclude = self
            .exclude
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidExclude {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ValidatedConfig {
            root_dir: root_dir.clone(),
            pattern,
            exclude,
            variable_name: self.variable_name.clone(),
            manifest_name: self.manifest_name.clone(),
        })
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            pattern: DEFAULT_PATTERN.to_string(),
            exclude: Vec::new(),
            variable_name: DEFAULT_VARIABLE_NAME.to_string(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
        }
    }
}

/// A configuration that passed [`RouterConfig::validate`].
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    root_dir: PathBuf,
    pattern: GlobMatcher,
    exclude: Vec<Regex>,
    variable_name: String,
    manifest_name: String,
}

impl ValidatedConfig {
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn pattern(&self) -> &GlobMatcher {
        &self.pattern
    }

    pub fn exclude(&self) -> &[Regex] {
        &self.exclude
    }

    pub fn variable_name(&self) -> &str {
        &self.variable_name
    }

    /// Path of the manifest module for a build rooted at `build_context`.
    pub fn manifest_path(&self, build_context: &Path) -> PathBuf {
        build_context.join(&self.manifest_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn absolute_root() -> PathBuf {
        std::env::temp_dir().join("pages")
    }

    #[test]
    fn test_defaults() {
        let config = RouterConfig::new(absolute_root());

        assert_eq!(config.pattern, "**/*.{js,jsx}");
        assert_eq!(config.variable_name, "ROUTES");
        assert!(config.exclude.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_root_dir_fails() {
        let err = RouterConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRootDir));
    }

    #[test]
    fn test_relative_root_dir_fails() {
        let err = RouterConfig::new("pages").validate().unwrap_err();
        assert!(matches!(err, ConfigError::RelativeRootDir(_)));
    }

    #[test]
    fn test_invalid_exclude_fails() {
        let err = RouterConfig::new(absolute_root())
            .exclude("(unclosed")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidExclude { .. }));
    }

    #[test]
    fn test_invalid_pattern_fails() {
        let err = RouterConfig::new(absolute_root())
            .with_pattern("**/*.{js")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_empty_variable_name_fails() {
        let err = RouterConfig::new(absolute_root())
            .with_variable_name(" ")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyVariableName));
    }

    #[test]
    fn test_default_pattern_matches_nested_sources() {
        let validated = RouterConfig::new(absolute_root()).validate().unwrap();
        let pattern = validated.pattern();

        assert!(pattern.is_match("index.js"));
        assert!(pattern.is_match("blog/post.jsx"));
        assert!(!pattern.is_match("styles.css"));
    }

    #[test]
    fn test_deserialize_camel_case_with_defaults() {
        let config: RouterConfig = serde_json::from_str(
            r#"{ "rootDir": "/srv/pages", "exclude": ["^_draft"], "variableName": "PAGES" }"#,
        )
        .unwrap();

        assert_eq!(config.root_dir, Some(PathBuf::from("/srv/pages")));
        assert_eq!(config.exclude, vec!["^_draft".to_string()]);
        assert_eq!(config.variable_name, "PAGES");
        assert_eq!(config.pattern, DEFAULT_PATTERN);
        assert_eq!(config.manifest_name, DEFAULT_MANIFEST_NAME);
    }
}
