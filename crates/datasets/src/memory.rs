//! In-memory object store
//!
//! Holds objects in a sorted map with the flat key semantics of a real
//! object store: a file can exist without any marker for its parent
//! directories, and deleting a marker does not touch the keys under it
//! unless asked to.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use platform_core::{Error, ProjectId, Result};
use tracing::{debug, instrument};

use crate::{ListObjectsResponse, Object, ObjectClient};

/// Default number of keys per listing page
const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
    last_modified: DateTime<Utc>,
}

/// Object store backed by process memory
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<(ProjectId, String), StoredObject>>,
    page_size: usize,
    version: AtomicU64,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a store that returns at most `page_size` keys per listing page
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
            version: AtomicU64::new(0),
        }
    }

    /// Number of stored objects across all projects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Replace the etag of a stored object
    pub fn set_etag(&self, project_id: ProjectId, path: &str, etag: impl Into<String>) -> Result<()> {
        let mut objects = self.objects.write();
        let stored = objects
            .get_mut(&(project_id, path.to_string()))
            .ok_or_else(|| not_found(path))?;
        stored.etag = etag.into();
        Ok(())
    }

    fn next_etag(&self) -> String {
        let version = self.version.fetch_add(1, Ordering::Relaxed) + 1;
        format!("\"{:032x}\"", version)
    }

    fn insert(&self, project_id: ProjectId, path: &str, data: Bytes) {
        let stored = StoredObject {
            data,
            etag: self.next_etag(),
            last_modified: Utc::now(),
        };
        self.objects
            .write()
            .insert((project_id, path.to_string()), stored);
    }

    /// Keys addressed by an operation: the key itself and, when recursive,
    /// every key under its directory form
    fn addressed_keys(&self, project_id: ProjectId, path: &str, recursive: bool) -> Vec<String> {
        let objects = self.objects.read();
        let directory = format!("{}/", path.trim_end_matches('/'));
        objects
            .keys()
            .filter(|(project, _)| *project == project_id)
            .map(|(_, key)| key)
            .filter(|key| key.as_str() == path || (recursive && key.starts_with(&directory)))
            .cloned()
            .collect()
    }
}

fn not_found(path: &str) -> Error {
    Error::ObjectNotFound {
        path: path.to_string(),
    }
}

fn to_object(path: &str, stored: &StoredObject) -> Object {
    Object {
        path: path.to_string(),
        size: stored.data.len() as u64,
        etag: stored.etag.clone(),
        last_modified: Some(stored.last_modified),
    }
}

#[async_trait]
impl ObjectClient for MemoryObjectStore {
    #[instrument(skip(self), fields(backend = "memory"))]
    async fn list(
        &self,
        project_id: ProjectId,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<ListObjectsResponse> {
        let offset = match page_token {
            Some(token) => token.parse::<usize>().map_err(|_| Error::ObjectStore {
                message: format!("invalid page token {:?}", token),
            })?,
            None => 0,
        };

        let objects = self.objects.read();
        let matching: Vec<Object> = objects
            .iter()
            .filter(|((project, key), _)| *project == project_id && key.starts_with(prefix))
            .map(|((_, key), stored)| to_object(key, stored))
            .collect();

        let end = (offset + self.page_size).min(matching.len());
        let page = matching.get(offset..end).map(<[Object]>::to_vec).unwrap_or_default();
        let next_page_token = (end < matching.len()).then(|| end.to_string());

        debug!(count = page.len(), has_more = next_page_token.is_some(), "Listed objects");
        Ok(ListObjectsResponse {
            objects: page,
            next_page_token,
        })
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn get(&self, project_id: ProjectId, path: &str) -> Result<Object> {
        let objects = self.objects.read();
        objects
            .get(&(project_id, path.to_string()))
            .map(|stored| to_object(path, stored))
            .ok_or_else(|| not_found(path))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn create_directory(&self, project_id: ProjectId, path: &str) -> Result<()> {
        let marker = format!("{}/", path.trim_end_matches('/'));
        self.insert(project_id, &marker, Bytes::new());
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn copy(
        &self,
        project_id: ProjectId,
        source: &str,
        destination: &str,
        recursive: bool,
    ) -> Result<()> {
        let keys = self.addressed_keys(project_id, source, recursive);
        if keys.is_empty() {
            return Err(not_found(source));
        }

        let directory = format!("{}/", source.trim_end_matches('/'));
        for key in keys {
            let target = match key.strip_prefix(&directory) {
                Some(suffix) if key != source => {
                    format!("{}/{}", destination.trim_end_matches('/'), suffix)
                }
                _ => destination.to_string(),
            };
            let data = self
                .objects
                .read()
                .get(&(project_id, key.clone()))
                .map(|stored| stored.data.clone())
                .ok_or_else(|| not_found(&key))?;
            debug!(%key, %target, "Copying object");
            self.insert(project_id, &target, data);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn delete(&self, project_id: ProjectId, path: &str, recursive: bool) -> Result<()> {
        let keys = self.addressed_keys(project_id, path, recursive);
        if keys.is_empty() {
            return Err(not_found(path));
        }

        let mut objects = self.objects.write();
        for key in keys {
            objects.remove(&(project_id, key));
        }
        Ok(())
    }

    #[instrument(skip(self, data), fields(backend = "memory", size = data.len()))]
    async fn upload(&self, project_id: ProjectId, path: &str, data: Bytes) -> Result<u64> {
        let size = data.len() as u64;
        self.insert(project_id, path, data);
        Ok(size)
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn download(&self, project_id: ProjectId, path: &str) -> Result<Bytes> {
        let objects = self.objects.read();
        objects
            .get(&(project_id, path.to_string()))
            .map(|stored| stored.data.clone())
            .ok_or_else(|| not_found(path))
    }
}
