//! Local filesystem object store
//!
//! Stores each project under `{base}/{project_id}/`. Files map to objects
//! and directories map to markers, listed with a trailing `/`. Writes are
//! atomic: data goes to a staging file first and is renamed into place.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use platform_core::{DatasetsConfig, Error, ProjectId, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{ListObjectsResponse, Object, ObjectClient};

/// Staging area for in-flight writes, kept outside every project root
const STAGING_DIR: &str = ".staging";

/// Object store over a local directory
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    base_path: PathBuf,
    page_size: usize,
}

impl LocalObjectStore {
    /// Create a store rooted at `base_path`
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self::with_config(base_path, &DatasetsConfig::default())
    }

    pub fn with_config<P: AsRef<Path>>(base_path: P, config: &DatasetsConfig) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            page_size: config.list_page_size.max(1),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn project_root(&self, project_id: ProjectId) -> PathBuf {
        self.base_path.join(project_id.to_string())
    }

    /// Resolve a key to a location on disk
    fn resolve_path(&self, project_id: ProjectId, key: &str) -> Result<PathBuf> {
        let mut resolved = self.project_root(project_id);
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(Error::ObjectStore {
                    message: format!("invalid object key {:?}", key),
                });
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }

    fn temp_path(&self, full_path: &Path) -> PathBuf {
        let temp_name = format!(
            "{}.{}.tmp",
            full_path.file_name().unwrap_or_default().to_string_lossy(),
            Uuid::new_v4()
        );
        self.base_path.join(STAGING_DIR).join(temp_name)
    }

    /// Every key in a project, sorted
    async fn all_keys(&self, project_id: ProjectId) -> Result<Vec<String>> {
        let root = self.project_root(project_id);
        let mut keys = Vec::new();
        if !fs::try_exists(&root).await? {
            return Ok(keys);
        }

        let mut stack = vec![(root, String::from("/"))];
        while let Some((dir, key_prefix)) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    let marker = format!("{}{}/", key_prefix, name);
                    keys.push(marker.clone());
                    stack.push((entry.path(), marker));
                } else if metadata.is_file() {
                    keys.push(format!("{}{}", key_prefix, name));
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn describe(&self, project_id: ProjectId, key: &str) -> Result<Object> {
        let full_path = self.resolve_path(project_id, key)?;
        let metadata = match fs::metadata(&full_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found(key)),
            Err(e) => return Err(store_error("stat", key, e)),
        };

        // Markers and files live in different key spaces
        if metadata.is_dir() != key.ends_with('/') {
            return Err(not_found(key));
        }

        let size = if metadata.is_dir() { 0 } else { metadata.len() };
        let modified = metadata.modified().ok();
        let nanos = modified
            .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        Ok(Object {
            path: key.to_string(),
            size,
            etag: format!("\"{:x}-{:x}\"", size, nanos),
            last_modified: modified.map(DateTime::<Utc>::from),
        })
    }

    async fn write_atomic(&self, full_path: &Path, data: &[u8]) -> Result<()> {
        let temp_path = self.temp_path(full_path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::create_dir_all(self.base_path.join(STAGING_DIR)).await?;

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;

        fs::rename(&temp_path, full_path).await?;
        Ok(())
    }

    async fn copy_file(&self, project_id: ProjectId, source: &str, destination: &str) -> Result<()> {
        let data = self.download(project_id, source).await?;
        let target = self.resolve_path(project_id, destination)?;
        self.write_atomic(&target, &data).await
    }
}

fn not_found(key: &str) -> Error {
    Error::ObjectNotFound {
        path: key.to_string(),
    }
}

fn store_error(operation: &str, key: &str, e: std::io::Error) -> Error {
    Error::ObjectStore {
        message: format!("Failed to {} {}: {}", operation, key, e),
    }
}

fn as_marker(key: &str) -> String {
    format!("{}/", key.trim_end_matches('/'))
}

#[async_trait]
impl ObjectClient for LocalObjectStore {
    #[instrument(skip(self), fields(backend = "local"))]
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

        let matching: Vec<String> = self
            .all_keys(project_id)
            .await?
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect();

        let end = (offset + self.page_size).min(matching.len());
        let mut objects = Vec::with_capacity(end.saturating_sub(offset));
        for key in matching.iter().take(end).skip(offset) {
            objects.push(self.describe(project_id, key).await?);
        }
        let next_page_token = (end < matching.len()).then(|| end.to_string());

        debug!(count = objects.len(), has_more = next_page_token.is_some(), "Listed objects");
        Ok(ListObjectsResponse {
            objects,
            next_page_token,
        })
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn get(&self, project_id: ProjectId, path: &str) -> Result<Object> {
        self.describe(project_id, path).await
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn create_directory(&self, project_id: ProjectId, path: &str) -> Result<()> {
        let full_path = self.resolve_path(project_id, path)?;
        debug!(?full_path, "Creating directory");
        fs::create_dir_all(&full_path)
            .await
            .map_err(|e| store_error("create directory", path, e))
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn copy(
        &self,
        project_id: ProjectId,
        source: &str,
        destination: &str,
        recursive: bool,
    ) -> Result<()> {
        let source_path = self.resolve_path(project_id, source)?;
        let is_dir = fs::metadata(&source_path)
            .await
            .map(|m| m.is_dir())
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => not_found(source),
                _ => store_error("copy", source, e),
            })?;

        if !is_dir {
            return self.copy_file(project_id, source, destination).await;
        }

        let source_marker = as_marker(source);
        let destination_marker = as_marker(destination);
        self.create_directory(project_id, &destination_marker).await?;
        if !recursive {
            return Ok(());
        }

        for key in self.all_keys(project_id).await? {
            let Some(suffix) = key.strip_prefix(&source_marker) else {
                continue;
            };
            let target = format!("{}{}", destination_marker, suffix);
            debug!(%key, %target, "Copying object");
            if key.ends_with('/') {
                self.create_directory(project_id, &target).await?;
            } else {
                self.copy_file(project_id, &key, &target).await?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn delete(&self, project_id: ProjectId, path: &str, recursive: bool) -> Result<()> {
        let full_path = self.resolve_path(project_id, path)?;
        let metadata = match fs::metadata(&full_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found(path)),
            Err(e) => return Err(store_error("delete", path, e)),
        };

        debug!(?full_path, recursive, "Deleting");
        let result = if !metadata.is_dir() {
            fs::remove_file(&full_path).await
        } else if recursive {
            fs::remove_dir_all(&full_path).await
        } else {
            fs::remove_dir(&full_path).await
        };
        result.map_err(|e| store_error("delete", path, e))
    }

    #[instrument(skip(self, data), fields(backend = "local", size = data.len()))]
    async fn upload(&self, project_id: ProjectId, path: &str, data: Bytes) -> Result<u64> {
        if path.ends_with('/') {
            return Err(Error::ObjectStore {
                message: format!("cannot upload data to directory key {}", path),
            });
        }
        let full_path = self.resolve_path(project_id, path)?;
        let size = data.len() as u64;

        debug!(?full_path, size, "Writing object atomically");
        self.write_atomic(&full_path, &data)
            .await
            .map_err(|e| match e {
                Error::Io(io) => store_error("upload", path, io),
                other => other,
            })?;
        Ok(size)
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn download(&self, project_id: ProjectId, path: &str) -> Result<Bytes> {
        let full_path = self.resolve_path(project_id, path)?;
        if path.ends_with('/') {
            return Err(not_found(path));
        }

        match fs::read(&full_path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found(path)),
            Err(e) if full_path.is_dir() => {
                debug!(error = %e, "Key addresses a directory");
                Err(not_found(path))
            }
            Err(e) => Err(store_error("read", path, e)),
        }
    }
}
