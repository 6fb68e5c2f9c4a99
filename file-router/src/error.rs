//! Error types for the file router.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;

/// Errors that can occur while setting up or running the router.
#[derive(Error, Debug)]
pub enum RouterError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Root directory does not exist or is not a directory.
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// The registry task needs a tokio runtime and none is running.
    #[error("no tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// The registry task panicked or was cancelled.
    #[error("registry task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}

/// Configuration problems, raised when the registry is built.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("`rootDir` is required")]
    MissingRootDir,

    #[error("`rootDir` must be an absolute path, got {}", .0.display())]
    RelativeRootDir(PathBuf),

    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        source: globset::Error,
    },

    #[error("invalid exclude expression `{pattern}`: {source}")]
    InvalidExclude {
        pattern: String,
        source: regex::Error,
    },

    #[error("`variableName` must not be empty")]
    EmptyVariableName,
}

/// An exclusion predicate failed to evaluate.
#[derive(Error, Debug)]
#[error("exclusion predicate `{predicate}` failed: {message}")]
pub struct PredicateError {
    pub predicate: String,
    pub message: String,
}

/// A relative path could not be turned into a route.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransformError {
    #[error("cannot derive a route from an empty path")]
    EmptyPath,

    #[error("expected a path relative to the root directory, got `{0}`")]
    AbsolutePath(String),

    #[error("path `{0}` escapes the root directory")]
    ParentTraversal(String),
}

/// The downstream sink refused a snapshot.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to write module `{identifier}`: {source}")]
    Write {
        identifier: String,
        source: std::io::Error,
    },

    #[error("module store is poisoned")]
    Poisoned,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-event failures. These are logged and reported through
/// [`crate::EventOutcome::Rejected`], never returned as `Err` from an event
/// handler.
#[derive(Error, Debug)]
pub enum EventError {
    #[error(transparent)]
    Exclusion(#[from] PredicateError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}
