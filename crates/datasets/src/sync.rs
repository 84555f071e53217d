//! Filesystem-like operations over a flat object store
//!
//! The store only knows keys. A directory is either an explicit marker
//! (a key ending in `/`) or implied by keys sharing its prefix. Every
//! operation classifies paths afresh from a listing; nothing is cached
//! between calls.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use platform_core::{
    drain_tokens, DatasetsConfig, Error, ProjectContext, ProjectId, Result, TokenPage,
    TokenPageSource,
};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::path::{
    as_directory, join, project_parent_directories, project_relative_path,
    rationalise_projectpath,
};
use crate::{GlobPattern, ObjectClient};

/// What a project path refers to at the time of the call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
    Absent,
}

/// Dataset operations for a single project
#[derive(Clone)]
pub struct Datasets {
    pub(crate) client: Arc<dyn ObjectClient>,
    pub(crate) project_id: ProjectId,
    pub(crate) temp_dir: Option<PathBuf>,
}

impl std::fmt::Debug for Datasets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datasets")
            .field("project_id", &self.project_id)
            .field("temp_dir", &self.temp_dir)
            .finish_non_exhaustive()
    }
}

/// Pages of an object listing, fed to the token drain
struct ObjectListing<'a> {
    client: &'a dyn ObjectClient,
    project_id: ProjectId,
    prefix: &'a str,
}

#[async_trait]
impl<'a> TokenPageSource<String> for ObjectListing<'a> {
    async fn fetch_page(&self, page_token: Option<&str>) -> Result<TokenPage<String>> {
        let response = self
            .client
            .list(self.project_id, self.prefix, page_token)
            .await?;
        Ok(TokenPage {
            items: response.objects.into_iter().map(|o| o.path).collect(),
            next_page_token: response.next_page_token,
        })
    }
}

impl Datasets {
    pub fn new(client: Arc<dyn ObjectClient>, project_id: ProjectId) -> Self {
        Self {
            client,
            project_id,
            temp_dir: None,
        }
    }

    pub fn with_config(
        client: Arc<dyn ObjectClient>,
        project_id: ProjectId,
        config: &DatasetsConfig,
    ) -> Self {
        Self {
            client,
            project_id,
            temp_dir: config.temp_dir.clone(),
        }
    }

    /// Bind to the project of the runtime context
    ///
    /// # Errors
    /// Returns `Error::ProjectResolution` if the context names no project
    pub fn for_project(client: Arc<dyn ObjectClient>, context: &ProjectContext) -> Result<Self> {
        let project_id = context.project_id.ok_or_else(|| Error::ProjectResolution {
            message: "no project given and FACULTY_PROJECT_ID is not set".to_string(),
        })?;
        Ok(Self::new(client, project_id))
    }

    /// Stage `open` downloads under `temp_dir` instead of the system default
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// List every path starting with `prefix`, following all pages
    ///
    /// Paths with any segment starting with `.` are dropped unless
    /// `show_hidden` is set.
    #[instrument(skip(self), fields(project_id = %self.project_id))]
    pub async fn ls(&self, prefix: &str, show_hidden: bool) -> Result<Vec<String>> {
        let prefix = rationalise_projectpath(prefix);
        let listing = ObjectListing {
            client: self.client.as_ref(),
            project_id: self.project_id,
            prefix: &prefix,
        };

        let mut paths = drain_tokens(&listing).await?;
        if !show_hidden {
            paths.retain(|path| !crate::path::is_hidden(path));
        }

        debug!(count = paths.len(), "Listed paths");
        Ok(paths)
    }

    /// List paths under `prefix` that match a shell-style wildcard
    #[instrument(skip(self), fields(project_id = %self.project_id))]
    pub async fn glob(&self, pattern: &str, prefix: &str, show_hidden: bool) -> Result<Vec<String>> {
        let pattern = GlobPattern::new(pattern)?;
        let paths = self.ls(prefix, show_hidden).await?;
        Ok(pattern.filter(paths))
    }

    /// Whether anything exists under the directory form of `path`
    pub async fn is_dir(&self, path: &str) -> Result<bool> {
        let listing = self.ls(&as_directory(path), true).await?;
        Ok(!listing.is_empty())
    }

    /// Whether `path` names an object and is not a directory
    pub async fn is_file(&self, path: &str) -> Result<bool> {
        Ok(self.classify(path).await? == PathKind::File)
    }

    /// Classify a path as a file, a directory or absent
    #[instrument(skip(self), fields(project_id = %self.project_id))]
    pub async fn classify(&self, path: &str) -> Result<PathKind> {
        if self.is_dir(path).await? {
            return Ok(PathKind::Directory);
        }

        let rationalised = rationalise_projectpath(path);
        let matches = self.ls(&rationalised, true).await?;
        if matches.iter().any(|candidate| *candidate == rationalised) {
            Ok(PathKind::File)
        } else {
            Ok(PathKind::Absent)
        }
    }

    /// Upload a local file or directory tree to `project_path`
    ///
    /// Missing ancestor directory markers are created first, from a single
    /// listing of the project. Directories get a marker of their own before
    /// their children are uploaded.
    #[instrument(skip(self, local_path), fields(project_id = %self.project_id))]
    pub async fn put<P: AsRef<Path>>(&self, local_path: P, project_path: &str) -> Result<()> {
        let local_path = local_path.as_ref();
        let project_path = rationalise_projectpath(project_path);

        let metadata = fs::metadata(local_path).await?;
        if !metadata.is_dir() && project_path.ends_with('/') {
            return Err(Error::datasets(format!(
                "the source path {:?} is a normal file but the destination path {:?} \
                 indicates a directory - please provide a full destination path",
                local_path, project_path
            )));
        }

        self.create_parent_directories(&project_path).await?;
        self.put_recursive(local_path, &project_path).await?;

        info!(local = %local_path.display(), %project_path, "Put complete");
        Ok(())
    }

    async fn create_parent_directories(&self, project_path: &str) -> Result<()> {
        let existing: HashSet<String> = self.ls("/", true).await?.into_iter().collect();

        for directory in project_parent_directories(project_path) {
            // The root is implicit and never listed
            if directory == "/" || existing.contains(&directory) {
                continue;
            }
            debug!(%directory, "Creating missing parent directory");
            self.client
                .create_directory(self.project_id, &directory)
                .await?;
        }
        Ok(())
    }

    /// Upload without checking that parent markers exist
    async fn put_recursive(&self, local_path: &Path, project_path: &str) -> Result<()> {
        let mut pending = vec![(local_path.to_path_buf(), project_path.to_string())];

        while let Some((local, remote)) = pending.pop() {
            if fs::metadata(&local).await?.is_dir() {
                let marker = as_directory(&remote);
                self.client
                    .create_directory(self.project_id, &marker)
                    .await?;

                let mut children = Vec::new();
                let mut entries = fs::read_dir(&local).await?;
                while let Some(entry) = entries.next_entry().await? {
                    let name = entry.file_name().into_string().map_err(|name| {
                        Error::datasets(format!("file name {:?} is not valid UTF-8", name))
                    })?;
                    children.push((entry.path(), join(&marker, &name)));
                }

                // Reverse order so the stack pops children alphabetically
                children.sort_by(|a, b| b.1.cmp(&a.1));
                pending.extend(children);
            } else {
                let data = fs::read(&local).await?;
                let size = self
                    .client
                    .upload(self.project_id, &remote, Bytes::from(data))
                    .await?;
                debug!(path = %remote, size, "Uploaded file");
            }
        }
        Ok(())
    }

    /// Download a project file or directory tree to `local_path`
    #[instrument(skip(self, local_path), fields(project_id = %self.project_id))]
    pub async fn get<P: AsRef<Path>>(&self, project_path: &str, local_path: P) -> Result<()> {
        let local_path = local_path.as_ref();
        let project_path = rationalise_projectpath(project_path);

        if self.is_dir(&project_path).await? {
            self.get_directory(&project_path, local_path).await
        } else {
            self.get_file(&project_path, local_path).await
        }
    }

    pub(crate) async fn get_file(&self, project_path: &str, local_path: &Path) -> Result<()> {
        if local_path.to_string_lossy().ends_with(std::path::MAIN_SEPARATOR) {
            return Err(Error::datasets(format!(
                "the source path {:?} is a normal file but the destination path {:?} \
                 indicates a directory - please provide a full destination path",
                project_path, local_path
            )));
        }

        let data = self.client.download(self.project_id, project_path).await?;
        fs::write(local_path, &data).await?;
        debug!(path = %project_path, local = %local_path.display(), size = data.len(), "Downloaded file");
        Ok(())
    }

    async fn get_directory(&self, project_path: &str, local_path: &Path) -> Result<()> {
        let containing = match local_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if !fs::metadata(containing).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("No such directory: {:?}", containing),
            )));
        }

        for object_path in self.ls(&as_directory(project_path), true).await? {
            let relative = project_relative_path(project_path, &object_path)?;
            let local_dest = if relative.is_empty() {
                local_path.to_path_buf()
            } else {
                local_path.join(&relative)
            };

            if object_path.ends_with('/') {
                fs::create_dir_all(&local_dest).await?;
            } else {
                if let Some(parent) = local_dest.parent() {
                    fs::create_dir_all(parent).await?;
                }
                self.get_file(&object_path, &local_dest).await?;
            }
        }
        Ok(())
    }

    /// Copy within the project using the store's native copy
    #[instrument(skip(self), fields(project_id = %self.project_id))]
    pub async fn cp(&self, source: &str, destination: &str, recursive: bool) -> Result<()> {
        let source = rationalise_projectpath(source);
        let destination = rationalise_projectpath(destination);
        self.client
            .copy(self.project_id, &source, &destination, recursive)
            .await?;
        info!(%source, %destination, recursive, "Copied");
        Ok(())
    }

    /// Move a file or directory by copying and then removing the source
    ///
    /// Not atomic: if the removal fails the copy stays in place and the
    /// source is left behind.
    #[instrument(skip(self), fields(project_id = %self.project_id))]
    pub async fn mv(&self, source: &str, destination: &str) -> Result<()> {
        let source = rationalise_projectpath(source);
        let destination = rationalise_projectpath(destination);

        let (source, destination, recursive) = if self.is_dir(&source).await? {
            (as_directory(&source), as_directory(&destination), true)
        } else {
            (source, destination, false)
        };

        self.client
            .copy(self.project_id, &source, &destination, recursive)
            .await?;

        if let Err(e) = self
            .client
            .delete(self.project_id, &source, recursive)
            .await
        {
            warn!(%source, %destination, error = %e, "Copied but failed to remove source");
            return Err(e);
        }

        info!(%source, %destination, "Moved");
        Ok(())
    }

    /// Remove a path, and with `recursive` everything under it
    #[instrument(skip(self), fields(project_id = %self.project_id))]
    pub async fn rm(&self, path: &str, recursive: bool) -> Result<()> {
        let path = rationalise_projectpath(path);
        self.client
            .delete(self.project_id, &path, recursive)
            .await?;
        info!(%path, recursive, "Removed");
        Ok(())
    }

    /// Remove a directory and everything under it
    pub async fn rmdir(&self, path: &str) -> Result<()> {
        self.rm(path, true).await
    }

    /// Version tag of the object at `path`, without surrounding quotes
    #[instrument(skip(self), fields(project_id = %self.project_id))]
    pub async fn etag(&self, path: &str) -> Result<String> {
        let path = rationalise_projectpath(path);
        let object = self.client.get(self.project_id, &path).await?;
        Ok(object.etag.trim_matches('"').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ObjectCall, RecordingObjectClient};
    use crate::MemoryObjectStore;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn setup() -> (Arc<RecordingObjectClient>, Datasets) {
        let client = Arc::new(RecordingObjectClient::new(MemoryObjectStore::with_page_size(2)));
        let datasets = Datasets::new(client.clone(), ProjectId::new(Uuid::new_v4()));
        (client, datasets)
    }

    async fn seed(datasets: &Datasets, paths: &[&str]) {
        for path in paths {
            if path.ends_with('/') {
                datasets
                    .client
                    .create_directory(datasets.project_id, path)
                    .await
                    .unwrap();
            } else {
                datasets
                    .client
                    .upload(datasets.project_id, path, Bytes::from(path.to_string()))
                    .await
                    .unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_ls_drains_pages_and_hides_dotfiles() {
        let (client, datasets) = setup();
        seed(&datasets, &["/a.txt", "/.hidden/x", "/b/", "/b/.c", "/b/d"]).await;
        client.clear();

        let visible = datasets.ls("/", false).await.unwrap();
        assert_eq!(visible, vec!["/a.txt", "/b/", "/b/d"]);

        // Five keys at two per page
        let lists = client
            .calls()
            .into_iter()
            .filter(|c| matches!(c, ObjectCall::List { .. }))
            .count();
        assert_eq!(lists, 3);

        let all = datasets.ls("", true).await.unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn test_glob_skips_hidden_matches() {
        let (_client, datasets) = setup();
        seed(&datasets, &["/data/a.csv", "/data/b.txt", "/data/.hidden.csv"]).await;

        let matches = datasets.glob("*.csv", "/data/", false).await.unwrap();
        assert_eq!(matches, vec!["/data/a.csv"]);

        let matches = datasets.glob("*.csv", "/data/", true).await.unwrap();
        assert_eq!(matches, vec!["/data/.hidden.csv", "/data/a.csv"]);
    }

    #[tokio::test]
    async fn test_glob_star_crosses_directories() {
        let (_client, datasets) = setup();
        seed(
            &datasets,
            &["/data/x.csv", "/data/y.txt", "/data/raw/", "/data/raw/z.csv"],
        )
        .await;

        let matches = datasets.glob("*.csv", "/data/", false).await.unwrap();
        assert_eq!(matches, vec!["/data/raw/z.csv", "/data/x.csv"]);
    }

    #[tokio::test]
    async fn test_is_dir_ignores_trailing_slash() {
        let (_client, datasets) = setup();
        seed(&datasets, &["/a/b/c.txt"]).await;

        assert!(datasets.is_dir("/a/b").await.unwrap());
        assert_eq!(
            datasets.is_dir("/a/b").await.unwrap(),
            datasets.is_dir("/a/b/").await.unwrap()
        );
        assert!(!datasets.is_dir("/a/b/c.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_classify() {
        let (_client, datasets) = setup();
        seed(&datasets, &["/d/", "/d/x.txt", "/dx.txt"]).await;

        assert_eq!(datasets.classify("/d").await.unwrap(), PathKind::Directory);
        assert_eq!(datasets.classify("d/x.txt").await.unwrap(), PathKind::File);
        assert_eq!(datasets.classify("/d/missing").await.unwrap(), PathKind::Absent);
        // A prefix of an existing key is not a file
        assert_eq!(datasets.classify("/dx").await.unwrap(), PathKind::Absent);
        assert!(datasets.is_file("/dx.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_directory_tree() {
        let (client, datasets) = setup();
        let local = TempDir::new().unwrap();
        std::fs::write(local.path().join("x.txt"), "x").unwrap();
        std::fs::create_dir(local.path().join("sub")).unwrap();
        std::fs::write(local.path().join("sub").join("y.txt"), "y").unwrap();

        datasets.put(local.path(), "/d/").await.unwrap();

        let calls = client.calls();
        let created: Vec<_> = calls
            .iter()
            .filter_map(|c| match c {
                ObjectCall::CreateDirectory { path } => Some(path.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(created, vec!["/d/", "/d/sub/"]);

        let uploads: Vec<_> = calls
            .iter()
            .filter_map(|c| match c {
                ObjectCall::Upload { path } => Some(path.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(uploads, vec!["/d/sub/y.txt", "/d/x.txt"]);

        let root_lists = calls
            .iter()
            .filter(|c| matches!(c, ObjectCall::List { prefix, page_token: None } if prefix == "/"))
            .count();
        assert_eq!(root_lists, 1);
    }

    #[tokio::test]
    async fn test_put_creates_only_missing_parents() {
        let (client, datasets) = setup();
        seed(&datasets, &["/a/"]).await;
        client.clear();

        let local = TempDir::new().unwrap();
        let file = local.path().join("f.txt");
        std::fs::write(&file, "f").unwrap();

        datasets.put(&file, "/a/b/c/f.txt").await.unwrap();

        let created: Vec<_> = client
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                ObjectCall::CreateDirectory { path } => Some(path),
                _ => None,
            })
            .collect();
        assert_eq!(created, vec!["/a/b/", "/a/b/c/"]);
        assert_eq!(datasets.ls("/a/", false).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_put_file_to_directory_path_fails() {
        let (client, datasets) = setup();
        let local = TempDir::new().unwrap();
        let file = local.path().join("f.txt");
        std::fs::write(&file, "f").unwrap();

        let result = datasets.put(&file, "/d/").await;
        assert!(matches!(result, Err(Error::Datasets { .. })));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_directory() {
        let (_client, datasets) = setup();
        seed(&datasets, &["/d/", "/d/x.txt", "/d/sub/", "/d/sub/y.txt", "/d/empty/", "/dir2/z"]).await;
        let local = TempDir::new().unwrap();
        let target = local.path().join("out");

        datasets.get("/d", &target).await.unwrap();

        assert_eq!(std::fs::read_to_string(target.join("x.txt")).unwrap(), "/d/x.txt");
        assert_eq!(
            std::fs::read_to_string(target.join("sub").join("y.txt")).unwrap(),
            "/d/sub/y.txt"
        );
        assert!(target.join("empty").is_dir());
        assert!(!local.path().join("z").exists());
    }

    #[tokio::test]
    async fn test_get_directory_without_local_parent() {
        let (_client, datasets) = setup();
        seed(&datasets, &["/d/x.txt"]).await;
        let local = TempDir::new().unwrap();

        let result = datasets.get("/d", local.path().join("missing").join("out")).await;
        match result {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_file_to_directory_path_fails() {
        let (_client, datasets) = setup();
        seed(&datasets, &["/x.txt"]).await;
        let local = TempDir::new().unwrap();
        let target = format!("{}{}", local.path().display(), std::path::MAIN_SEPARATOR);

        let result = datasets.get("/x.txt", target).await;
        assert!(matches!(result, Err(Error::Datasets { .. })));
    }

    #[tokio::test]
    async fn test_mv_directory_passes_recursive() {
        let (client, datasets) = setup();
        seed(&datasets, &["/src/", "/src/a", "/src/b/c"]).await;
        client.clear();

        datasets.mv("/src", "/dst").await.unwrap();

        let mutations: Vec<_> = client
            .calls()
            .into_iter()
            .filter(|c| !matches!(c, ObjectCall::List { .. }))
            .collect();
        assert_eq!(
            mutations,
            vec![
                ObjectCall::Copy {
                    source: "/src/".to_string(),
                    destination: "/dst/".to_string(),
                    recursive: true,
                },
                ObjectCall::Delete {
                    path: "/src/".to_string(),
                    recursive: true,
                },
            ]
        );
        assert_eq!(datasets.ls("/", false).await.unwrap(), vec!["/dst/", "/dst/a", "/dst/b/c"]);
    }

    #[tokio::test]
    async fn test_mv_file() {
        let (_client, datasets) = setup();
        seed(&datasets, &["/a.txt"]).await;

        datasets.mv("/a.txt", "/b.txt").await.unwrap();
        assert_eq!(datasets.ls("/", false).await.unwrap(), vec!["/b.txt"]);
    }

    #[tokio::test]
    async fn test_mv_keeps_both_copies_when_delete_fails() {
        let (client, datasets) = setup();
        seed(&datasets, &["/src/", "/src/a"]).await;
        client.fail_deletes();

        let result = datasets.mv("/src", "/dst").await;
        assert!(matches!(result, Err(Error::ObjectStore { .. })));
        assert_eq!(
            datasets.ls("/", false).await.unwrap(),
            vec!["/dst/", "/dst/a", "/src/", "/src/a"]
        );
    }

    #[tokio::test]
    async fn test_cp_and_rm() {
        let (_client, datasets) = setup();
        seed(&datasets, &["/a.txt"]).await;

        datasets.cp("/a.txt", "/copy.txt", false).await.unwrap();
        assert_eq!(datasets.ls("/", false).await.unwrap(), vec!["/a.txt", "/copy.txt"]);

        datasets.rm("/a.txt", false).await.unwrap();
        assert_eq!(datasets.ls("/", false).await.unwrap(), vec!["/copy.txt"]);

        let result = datasets.rm("/a.txt", false).await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rmdir_is_recursive() {
        let (client, datasets) = setup();
        seed(&datasets, &["/d/", "/d/x"]).await;
        client.clear();

        datasets.rmdir("/d").await.unwrap();
        assert_eq!(
            client.calls(),
            vec![ObjectCall::Delete {
                path: "/d".to_string(),
                recursive: true,
            }]
        );
        assert!(datasets.ls("/", true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_etag_strips_quotes() {
        let store = MemoryObjectStore::new();
        let project = ProjectId::new(Uuid::new_v4());
        store.upload(project, "/f.csv", Bytes::from("f")).await.unwrap();
        store.set_etag(project, "/f.csv", "\"abc123\"").unwrap();

        let datasets = Datasets::new(Arc::new(store), project);
        assert_eq!(datasets.etag("f.csv").await.unwrap(), "abc123");
    }

    #[test]
    fn test_for_project_requires_context() {
        let client: Arc<dyn ObjectClient> = Arc::new(MemoryObjectStore::new());
        let result = Datasets::for_project(client.clone(), &ProjectContext::default());
        assert!(matches!(result, Err(Error::ProjectResolution { .. })));

        let project = ProjectId::new(Uuid::new_v4());
        let context = ProjectContext {
            project_id: Some(project),
            user_id: None,
        };
        let datasets = Datasets::for_project(client, &context).unwrap();
        assert_eq!(datasets.project_id(), project);
    }
}
