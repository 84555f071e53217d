//! Read access to dataset files through a local staging copy
//!
//! [`Datasets::open`] downloads the file into a fresh hidden temporary
//! directory and hands back an [`OpenedFile`]. Dropping the handle removes
//! the staged copy and its directory.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use platform_core::{Error, Result};
use tempfile::TempDir;
use tracing::{debug, instrument};

use crate::path::{basename, rationalise_projectpath};
use crate::Datasets;

/// How an opened file is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// `r` or `rt`: contents are UTF-8 text
    Text,
    /// `rb`: raw bytes
    Binary,
}

impl FromStr for OpenMode {
    type Err = Error;

    fn from_str(mode: &str) -> Result<Self> {
        if mode.chars().any(|c| matches!(c, 'w' | 'a' | 'x' | '+')) {
            return Err(Error::datasets(format!(
                "mode {:?} is not supported; only reading is implemented",
                mode
            )));
        }

        match mode {
            "r" | "rt" | "tr" => Ok(OpenMode::Text),
            "rb" | "br" => Ok(OpenMode::Binary),
            _ => Err(Error::datasets(format!("invalid mode {:?}", mode))),
        }
    }
}

/// A staged dataset file, removed from local disk on drop
///
/// Fields drop in declaration order: the handle closes before the staging
/// directory is deleted.
#[derive(Debug)]
pub struct OpenedFile {
    file: File,
    local_path: PathBuf,
    mode: OpenMode,
    _staging: TempDir,
}

impl OpenedFile {
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Location of the staged copy
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Read the rest of the file as text
    ///
    /// # Errors
    /// Returns `Error::Datasets` for files opened in binary mode, and
    /// `Error::Io` if the contents are not valid UTF-8
    pub fn read_text(&mut self) -> Result<String> {
        if self.mode == OpenMode::Binary {
            return Err(Error::datasets("file was opened in binary mode"));
        }
        let mut text = String::new();
        self.file.read_to_string(&mut text)?;
        Ok(text)
    }

    /// Read the rest of the file as bytes
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.file.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl Read for OpenedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for OpenedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl Datasets {
    /// Open a dataset file for reading
    ///
    /// The mode is checked before anything else, so a write mode fails
    /// without touching the store.
    ///
    /// # Errors
    /// Returns `Error::Datasets` for unsupported modes and for directories
    #[instrument(skip(self), fields(project_id = %self.project_id))]
    pub async fn open(&self, path: &str, mode: &str) -> Result<OpenedFile> {
        let mode: OpenMode = mode.parse()?;
        let project_path = rationalise_projectpath(path);

        if self.is_dir(&project_path).await? {
            return Err(Error::datasets("Can't open directories."));
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix(".");
        let staging = match &self.temp_dir {
            Some(dir) => builder.tempdir_in(dir)?,
            None => builder.tempdir()?,
        };

        let local_path = staging.path().join(basename(&project_path));
        self.get_file(&project_path, &local_path).await?;

        let file = tokio::fs::File::open(&local_path).await?.into_std().await;
        debug!(local = %local_path.display(), ?mode, "Opened staged copy");

        Ok(OpenedFile {
            file,
            local_path,
            mode,
            _staging: staging,
        })
    }

    /// Open a file, run `f` against it, then remove the staged copy
    ///
    /// Cleanup happens whether or not `f` succeeds.
    pub async fn with_open<F, R>(&self, path: &str, mode: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut OpenedFile) -> Result<R>,
    {
        let mut file = self.open(path, mode).await?;
        let result = f(&mut file);
        drop(file);
        result
    }
}
