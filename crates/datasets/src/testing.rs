//! Call-recording object client for tests

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use platform_core::{Error, ProjectId, Result};

use crate::{ListObjectsResponse, MemoryObjectStore, Object, ObjectClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectCall {
    List {
        prefix: String,
        page_token: Option<String>,
    },
    Get {
        path: String,
    },
    CreateDirectory {
        path: String,
    },
    Copy {
        source: String,
        destination: String,
        recursive: bool,
    },
    Delete {
        path: String,
        recursive: bool,
    },
    Upload {
        path: String,
    },
    Download {
        path: String,
    },
}

/// Wraps a [`MemoryObjectStore`] and records every call made through it
pub struct RecordingObjectClient {
    inner: MemoryObjectStore,
    calls: Mutex<Vec<ObjectCall>>,
    fail_deletes: Mutex<bool>,
}

impl RecordingObjectClient {
    pub fn new(inner: MemoryObjectStore) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            fail_deletes: Mutex::new(false),
        }
    }

    /// Make every following `delete` fail after it is recorded
    pub fn fail_deletes(&self) {
        *self.fail_deletes.lock() = true;
    }

    pub fn calls(&self) -> Vec<ObjectCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: ObjectCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ObjectClient for RecordingObjectClient {
    async fn list(
        &self,
        project_id: ProjectId,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<ListObjectsResponse> {
        self.record(ObjectCall::List {
            prefix: prefix.to_string(),
            page_token: page_token.map(String::from),
        });
        self.inner.list(project_id, prefix, page_token).await
    }

    async fn get(&self, project_id: ProjectId, path: &str) -> Result<Object> {
        self.record(ObjectCall::Get {
            path: path.to_string(),
        });
        self.inner.get(project_id, path).await
    }

    async fn create_directory(&self, project_id: ProjectId, path: &str) -> Result<()> {
        self.record(ObjectCall::CreateDirectory {
            path: path.to_string(),
        });
        self.inner.create_directory(project_id, path).await
    }

    async fn copy(
        &self,
        project_id: ProjectId,
        source: &str,
        destination: &str,
        recursive: bool,
    ) -> Result<()> {
        self.record(ObjectCall::Copy {
            source: source.to_string(),
            destination: destination.to_string(),
            recursive,
        });
        self.inner
            .copy(project_id, source, destination, recursive)
            .await
    }

    async fn delete(&self, project_id: ProjectId, path: &str, recursive: bool) -> Result<()> {
        self.record(ObjectCall::Delete {
            path: path.to_string(),
            recursive,
        });
        if *self.fail_deletes.lock() {
            return Err(Error::ObjectStore {
                message: format!("delete of {} refused", path),
            });
        }
        self.inner.delete(project_id, path, recursive).await
    }

    async fn upload(&self, project_id: ProjectId, path: &str, data: Bytes) -> Result<u64> {
        self.record(ObjectCall::Upload {
            path: path.to_string(),
        });
        self.inner.upload(project_id, path, data).await
    }

    async fn download(&self, project_id: ProjectId, path: &str) -> Result<Bytes> {
        self.record(ObjectCall::Download {
            path: path.to_string(),
        });
        self.inner.download(project_id, path).await
    }
}
