//! Route derivation from relative page paths.

use crate::error::TransformError;

/// Turns a path relative to the root directory into a route.
///
/// Implementations must be pure: the same path always yields the same url.
pub trait UrlTransform: Send + Sync {
    fn to_url(&self, relative_path: &str) -> Result<String, TransformError>;
}

impl<F> UrlTransform for F
where
    F: Fn(&str) -> Result<String, TransformError> + Send + Sync,
{
    fn to_url(&self, relative_path: &str) -> Result<String, TransformError> {
        self(relative_path)
    }
}

/// File-system routing: `blog/post.js` becomes `/blog/post/` and an `index`
/// file maps to its directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUrlTransform;

impl UrlTransform for DefaultUrlTransform {
    fn to_url(&self, relative_path: &str) -> Result<String, TransformError> {
        let normalized = relative_path.replace('\\', "/");
        if normalized.is_empty() {
            return Err(TransformError::EmptyPath);
        }
        if normalized.starts_with('/') || has_drive_prefix(&normalized) {
            return Err(TransformError::AbsolutePath(relative_path.to_string()));
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in normalized.split('/') {
            match segment {
                "" | "." => {}
                ".." => return Err(TransformError::ParentTraversal(relative_path.to_string())),
                other => segments.push(other),
            }
        }

        let Some(file_name) = segments.pop() else {
            return Err(TransformError::EmptyPath);
        };
        let stem = strip_extension(file_name);
        if stem != "index" {
            segments.push(stem);
        }

        let mut url = String::from("/");
        for segment in segments {
            url.push_str(segment);
            url.push('/');
        }
        Ok(url)
    }
}

fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        // a leading dot is part of the name, not an extension
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
