//! Path arithmetic for project dataset paths
//!
//! Project paths are POSIX-style and absolute. A trailing `/` marks a
//! directory. None of these helpers touch the object store.

use platform_core::{Error, Result};

/// Normalise a project path
///
/// The result always starts with `/`. Empty and `.` segments are dropped,
/// `..` removes the preceding segment (never climbing above the root), and
/// a trailing `/` on the input is preserved.
///
/// ```
/// use datasets::path::rationalise_projectpath;
///
/// assert_eq!(rationalise_projectpath("data//raw/./x.csv"), "/data/raw/x.csv");
/// assert_eq!(rationalise_projectpath("/data/raw/../"), "/data/");
/// ```
pub fn rationalise_projectpath(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut rationalised = String::with_capacity(path.len() + 1);
    for segment in &segments {
        rationalised.push('/');
        rationalised.push_str(segment);
    }
    if path.ends_with('/') {
        rationalised.push('/');
    }
    rationalised
}

/// The directory form of a path, rationalised and ending in `/`
pub fn as_directory(path: &str) -> String {
    let mut directory = rationalise_projectpath(path);
    if !directory.ends_with('/') {
        directory.push('/');
    }
    directory
}

/// Every ancestor directory of a path, root first, each ending in `/`
///
/// A directory path does not count as its own ancestor.
///
/// ```
/// use datasets::path::project_parent_directories;
///
/// assert_eq!(
///     project_parent_directories("/a/b/c.txt"),
///     vec!["/", "/a/", "/a/b/"]
/// );
/// ```
pub fn project_parent_directories(path: &str) -> Vec<String> {
    let rationalised = rationalise_projectpath(path);
    let trimmed = rationalised.trim_end_matches('/');

    let mut parents = vec!["/".to_string()];
    let mut current = String::from("/");
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

    if let Some((_, ancestors)) = segments.split_last() {
        for segment in ancestors {
            current.push_str(segment);
            current.push('/');
            parents.push(current.clone());
        }
    } else {
        // The root has no parents
        parents.clear();
    }
    parents
}

/// Express `path` relative to the directory `base`
///
/// Both paths are rationalised first. The trailing `/` of a directory
/// marker is dropped, and `base` itself maps to the empty string.
///
/// # Errors
/// Returns `Error::Datasets` if `path` does not lie under `base`
pub fn project_relative_path(base: &str, path: &str) -> Result<String> {
    let base = as_directory(base);
    let path = rationalise_projectpath(path);

    if path == base || format!("{}/", path) == base {
        return Ok(String::new());
    }

    path.strip_prefix(&base)
        .map(|relative| relative.trim_end_matches('/').to_string())
        .ok_or_else(|| Error::datasets(format!("{} is not inside {}", path, base)))
}

/// Whether any segment of the path starts with `.`
pub fn is_hidden(path: &str) -> bool {
    path.split('/').any(|segment| segment.starts_with('.'))
}

/// Final segment of a path, ignoring a trailing `/`
pub fn basename(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

/// Join a child name onto a directory path
pub(crate) fn join(directory: &str, name: &str) -> String {
    format!("{}/{}", directory.trim_end_matches('/'), name)
}
