//! Exclusion predicates over relative page paths.

use std::fmt;

use globset::GlobMatcher;
use regex::Regex;

use crate::error::PredicateError;

/// A rule that, when it matches, suppresses processing of a path entirely.
pub trait PathPredicate: Send + Sync + fmt::Debug {
    fn matches(&self, relative_path: &str) -> Result<bool, PredicateError>;
}

impl PathPredicate for Regex {
    fn matches(&self, relative_path: &str) -> Result<bool, PredicateError> {
        Ok(self.is_match(relative_path))
    }
}

impl PathPredicate for GlobMatcher {
    fn matches(&self, relative_path: &str) -> Result<bool, PredicateError> {
        Ok(self.is_match(relative_path))
    }
}

/// A named, fallible closure predicate.
pub struct FnPredicate<F> {
    name: String,
    check: F,
}

impl<F> FnPredicate<F>
where
    F: Fn(&str) -> Result<bool, String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

impl<F> fmt::Debug for FnPredicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPredicate").field("name", &self.name).finish()
    }
}

impl<F> PathPredicate for FnPredicate<F>
where
    F: Fn(&str) -> Result<bool, String> + Send + Sync,
{
    fn matches(&self, relative_path: &str) -> Result<bool, PredicateError> {
        (self.check)(relative_path).map_err(|message| PredicateError {
            predicate: self.name.clone(),
            message,
        })
    }
}

/// Ordered set of exclusion predicates. A path is excluded when any matches.
#[derive(Debug, Default)]
pub struct ExcludeSet {
    predicates: Vec<Box<dyn PathPredicate>>,
}

impl ExcludeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, predicate: impl PathPredicate + 'static) {
        self.predicates.push(Box::new(predicate));
    }

    pub fn push_boxed(&mut self, predicate: Box<dyn PathPredicate>) {
        self.predicates.push(predicate);
    }

    pub fn into_predicates(self) -> Vec<Box<dyn PathPredicate>> {
        self.predicates
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Evaluate predicates in order, stopping at the first match or failure.
    pub fn is_excluded(&self, relative_path: &str) -> Result<bool, PredicateError> {
        for predicate in &self.predicates {
            if predicate.matches(relative_path)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_exclusion() {
        let mut set = ExcludeSet::new();
        set.push(Regex::new("^_draft").unwrap());

        assert!(set.is_excluded("_draft-note.js").unwrap());
        assert!(!set.is_excluded("notes/_draft.js").unwrap());
    }

    #[test]
    fn test_glob_exclusion() {
        let mut set = ExcludeSet::new();
        set.push(globset::Glob::new("**/*.test.js").unwrap().compile_matcher());

        assert!(set.is_excluded("blog/post.test.js").unwrap());
        assert!(!set.is_excluded("blog/post.js").unwrap());
    }

    #[test]
    fn test_empty_set_excludes_nothing() {
        assert!(!ExcludeSet::new().is_excluded("anything.js").unwrap());
    }

    #[test]
    fn test_failing_predicate_reports_name() {
        let mut set = ExcludeSet::new();
        set.push(FnPredicate::new("lookup", |_: &str| Err("backend down".to_string())));

        let err = set.is_excluded("a.js").unwrap_err();
        assert_eq!(err.predicate, "lookup");
        assert_eq!(err.message, "backend down");
    }

    #[test]
    fn test_first_match_short_circuits() {
        let mut set = ExcludeSet::new();
        set.push(Regex::new(r"\.js$").unwrap());
        set.push(FnPredicate::new("never-reached", |_: &str| Err("boom".to_string())));

        assert!(set.is_excluded("a.js").unwrap());
    }
}
