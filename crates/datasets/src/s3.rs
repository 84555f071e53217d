//! S3 object store
//!
//! Keys are laid out as `{prefix}/{project_id}{path}` in a single bucket.
//! Large uploads switch to multipart transfers. Failed calls are returned
//! as they are; nothing is retried here.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::Builder as S3ConfigBuilder,
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
    Client,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use platform_core::{Error, ProjectId, Result};
use tracing::{debug, instrument, warn};

use crate::{ListObjectsResponse, Object, ObjectClient};

/// Threshold for switching to multipart upload (5 MB)
const MULTIPART_THRESHOLD: usize = 5 * 1024 * 1024;

/// Part size for multipart uploads (5 MB minimum required by S3)
const MULTIPART_PART_SIZE: usize = 5 * 1024 * 1024;

/// Characters left unescaped in a copy source: unreserved ones and `/`
const COPY_SOURCE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// S3-backed object store
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    prefix: String,
}

/// Configuration for [`S3ObjectStore`]
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    /// Key prefix placed before every project id
    pub prefix: Option<String>,
    /// Custom endpoint URL, for S3-compatible services
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: None,
            endpoint_url: None,
            region: Some("eu-west-1".to_string()),
            force_path_style: false,
        }
    }
}

/// Full S3 key of a project path
fn object_key(prefix: &str, project_id: ProjectId, path: &str) -> String {
    let path = format!("/{}", path.trim_start_matches('/'));
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}{}", project_id, path)
    } else {
        format!("{}/{}{}", prefix, project_id, path)
    }
}

/// Project path of a full S3 key, if the key belongs to the project
fn object_path(prefix: &str, project_id: ProjectId, key: &str) -> Option<String> {
    let root = object_key(prefix, project_id, "");
    let root = root.trim_end_matches('/');
    key.strip_prefix(root)
        .filter(|rest| rest.starts_with('/'))
        .map(String::from)
}

/// Value of the `x-amz-copy-source` header, which must be URL-encoded
fn copy_source(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, utf8_percent_encode(key, COPY_SOURCE_SET))
}

fn s3_error(operation: &str, path: &str, e: impl std::fmt::Display) -> Error {
    let message = e.to_string();
    if message.contains("NoSuchKey") || message.contains("NotFound") {
        Error::ObjectNotFound {
            path: path.to_string(),
        }
    } else {
        Error::ObjectStore {
            message: format!("S3 {} failed for {}: {}", operation, path, message),
        }
    }
}

impl S3ObjectStore {
    /// Create a store using the default AWS credential chain
    pub async fn new(bucket: impl Into<String>) -> Self {
        Self::with_config(S3Config {
            bucket: bucket.into(),
            ..Default::default()
        })
        .await
    }

    pub async fn with_config(config: S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = config.region {
            loader = loader.region(aws_sdk_s3::config::Region::new(region));
        }
        let aws_config = loader.load().await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);
        if let Some(endpoint) = &config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        Self {
            client: Client::from_conf(s3_config_builder.build()),
            bucket: config.bucket,
            prefix: config.prefix.unwrap_or_default(),
        }
    }

    fn key(&self, project_id: ProjectId, path: &str) -> String {
        object_key(&self.prefix, project_id, path)
    }

    /// Every project path under `prefix`, following continuation tokens
    async fn keys_under(&self, project_id: ProjectId, prefix: &str) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.list(project_id, prefix, token.as_deref()).await?;
            paths.extend(page.objects.into_iter().map(|o| o.path));
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(paths)
    }

    async fn copy_one(&self, project_id: ProjectId, source: &str, destination: &str) -> Result<()> {
        let source_header = copy_source(&self.bucket, &self.key(project_id, source));
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(self.key(project_id, destination))
            .copy_source(source_header)
            .send()
            .await
            .map_err(|e| s3_error("copy_object", source, e))?;
        Ok(())
    }

    async fn delete_one(&self, project_id: ProjectId, path: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.key(project_id, path))
            .send()
            .await
            .map_err(|e| s3_error("delete_object", path, e))?;
        Ok(())
    }

    async fn multipart_upload(&self, key: &str, data: Bytes) -> Result<u64> {
        let size = data.len() as u64;

        let create_result = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| s3_error("create_multipart_upload", key, e))?;

        let upload_id = create_result.upload_id().ok_or_else(|| Error::ObjectStore {
            message: "No upload_id returned".to_string(),
        })?;

        debug!(key, upload_id, size, "Started multipart upload");

        let mut completed_parts = Vec::new();
        for (index, chunk) in data.chunks(MULTIPART_PART_SIZE).enumerate() {
            let part_number = index as i32 + 1;
            let result = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(data.slice_ref(chunk)))
                .send()
                .await;

            let part = match result {
                Ok(part) => part,
                Err(e) => {
                    self.abort_multipart_upload(key, upload_id).await;
                    return Err(s3_error("upload_part", key, e));
                }
            };

            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(part.e_tag().map(String::from))
                    .build(),
            );
            debug!(part_number, "Uploaded part");
        }

        let completed_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed_upload)
            .send()
            .await
            .map_err(|e| s3_error("complete_multipart_upload", key, e))?;

        debug!(key, size, "Completed multipart upload");
        Ok(size)
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) {
        let result = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await;
        if let Err(e) = result {
            warn!(key, upload_id, error = %e, "Failed to abort multipart upload");
        }
    }
}

#[async_trait]
impl ObjectClient for S3ObjectStore {
    #[instrument(skip(self), fields(backend = "s3", bucket = %self.bucket))]
    async fn list(
        &self,
        project_id: ProjectId,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<ListObjectsResponse> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(self.key(project_id, prefix));
        if let Some(token) = page_token {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| s3_error("list_objects_v2", prefix, e))?;

        let objects: Vec<Object> = response
            .contents()
            .iter()
            .filter_map(|entry| {
                let path = object_path(&self.prefix, project_id, entry.key()?)?;
                Some(Object {
                    path,
                    size: entry.size().unwrap_or_default().max(0) as u64,
                    etag: entry.e_tag().unwrap_or_default().to_string(),
                    last_modified: entry
                        .last_modified()
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
                })
            })
            .collect();

        let next_page_token = match response.is_truncated() {
            Some(true) => response.next_continuation_token().map(String::from),
            _ => None,
        };

        debug!(count = objects.len(), has_more = next_page_token.is_some(), "Listed S3 objects");
        Ok(ListObjectsResponse {
            objects,
            next_page_token,
        })
    }

    #[instrument(skip(self), fields(backend = "s3", bucket = %self.bucket))]
    async fn get(&self, project_id: ProjectId, path: &str) -> Result<Object> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.key(project_id, path))
            .send()
            .await
            .map_err(|e| s3_error("head_object", path, e))?;

        Ok(Object {
            path: path.to_string(),
            size: response.content_length().unwrap_or_default().max(0) as u64,
            etag: response.e_tag().unwrap_or_default().to_string(),
            last_modified: response
                .last_modified()
                .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
        })
    }

    #[instrument(skip(self), fields(backend = "s3", bucket = %self.bucket))]
    async fn create_directory(&self, project_id: ProjectId, path: &str) -> Result<()> {
        let marker = format!("{}/", path.trim_end_matches('/'));
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.key(project_id, &marker))
            .body(ByteStream::from_static(b""))
            .send()
            .await
            .map_err(|e| s3_error("put_object", &marker, e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3", bucket = %self.bucket))]
    async fn copy(
        &self,
        project_id: ProjectId,
        source: &str,
        destination: &str,
        recursive: bool,
    ) -> Result<()> {
        if !recursive {
            return self.copy_one(project_id, source, destination).await;
        }

        let source_dir = format!("{}/", source.trim_end_matches('/'));
        let destination_dir = format!("{}/", destination.trim_end_matches('/'));
        let keys = self.keys_under(project_id, &source_dir).await?;
        if keys.is_empty() {
            return self.copy_one(project_id, source, destination).await;
        }

        for key in keys {
            let target = format!("{}{}", destination_dir, &key[source_dir.len()..]);
            debug!(%key, %target, "Copying object");
            self.copy_one(project_id, &key, &target).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3", bucket = %self.bucket))]
    async fn delete(&self, project_id: ProjectId, path: &str, recursive: bool) -> Result<()> {
        if !recursive {
            return self.delete_one(project_id, path).await;
        }

        let directory = format!("{}/", path.trim_end_matches('/'));
        let mut keys = self.keys_under(project_id, &directory).await?;
        if !path.ends_with('/') {
            keys.push(path.to_string());
        }
        for key in keys {
            self.delete_one(project_id, &key).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, data), fields(backend = "s3", bucket = %self.bucket, size = data.len()))]
    async fn upload(&self, project_id: ProjectId, path: &str, data: Bytes) -> Result<u64> {
        let key = self.key(project_id, path);
        let size = data.len();

        if size > MULTIPART_THRESHOLD {
            return self.multipart_upload(&key, data).await;
        }

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| s3_error("put_object", path, e))?;
        Ok(size as u64)
    }

    #[instrument(skip(self), fields(backend = "s3", bucket = %self.bucket))]
    async fn download(&self, project_id: ProjectId, path: &str) -> Result<Bytes> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.key(project_id, path))
            .send()
            .await
            .map_err(|e| s3_error("get_object", path, e))?;

        let body = result.body.collect().await.map_err(|e| Error::ObjectStore {
            message: format!("Failed to read S3 response body: {}", e),
        })?;
        Ok(body.into_bytes())
    }
}
