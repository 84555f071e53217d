//! Object store client trait definition
//!
//! Defines the async interface every object store backend implements. Keys
//! are absolute paths within a project; a key ending in `/` is a directory
//! marker, an empty object standing in for a directory.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use platform_core::{ProjectId, Result};

/// Metadata of a single stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub path: String,
    pub size: u64,
    /// Version tag as reported by the store, usually wrapped in quotes
    pub etag: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of an object listing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListObjectsResponse {
    pub objects: Vec<Object>,
    /// Pass back to `list` for the following page; `None` on the last page
    pub next_page_token: Option<String>,
}

/// Async trait for object store backends
///
/// Every operation is scoped by a project. The store has no directories of
/// its own; callers build directory semantics from key prefixes.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// List one page of objects whose key starts with `prefix`
    async fn list(
        &self,
        project_id: ProjectId,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<ListObjectsResponse>;

    /// Get the metadata of a single object
    ///
    /// # Errors
    /// Returns `Error::ObjectNotFound` if no object has this key
    async fn get(&self, project_id: ProjectId, path: &str) -> Result<Object>;

    /// Create an empty directory marker at `path`
    async fn create_directory(&self, project_id: ProjectId, path: &str) -> Result<()>;

    /// Copy an object, or with `recursive` every object under a directory
    async fn copy(
        &self,
        project_id: ProjectId,
        source: &str,
        destination: &str,
        recursive: bool,
    ) -> Result<()>;

    /// Delete an object, or with `recursive` every object under a directory
    async fn delete(&self, project_id: ProjectId, path: &str, recursive: bool) -> Result<()>;

    /// Store `data` at `path`, returning the number of bytes written
    async fn upload(&self, project_id: ProjectId, path: &str, data: Bytes) -> Result<u64>;

    /// Fetch the contents of the object at `path`
    async fn download(&self, project_id: ProjectId, path: &str) -> Result<Bytes>;
}
