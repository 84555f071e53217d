//! Datasets - a hierarchical filesystem view over a flat object store
//!
//! The store only holds keys. This crate layers directories, listings,
//! transfers and read access on top of it:
//! - [`Datasets`]: `ls`, `glob`, `put`, `get`, `cp`, `mv`, `rm`, `rmdir`,
//!   `etag` and `open` for one project
//! - [`ObjectClient`]: the store interface, with local filesystem (the
//!   default `local` feature), in-memory and (with the `s3` feature) S3
//!   implementations
//! - [`path`]: project path normalisation helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use datasets::{Datasets, LocalObjectStore};
//! use platform_core::ProjectContext;
//!
//! # async fn example() -> platform_core::Result<()> {
//! let store = Arc::new(LocalObjectStore::new("/tmp/datasets"));
//! let datasets = Datasets::for_project(store, &ProjectContext::from_env()?)?;
//!
//! datasets.put("./results", "/experiments/run-1/").await?;
//! for path in datasets.glob("*.csv", "/experiments/", false).await? {
//!     println!("{}", path);
//! }
//! let text = datasets
//!     .with_open("/experiments/run-1/summary.txt", "r", |file| file.read_text())
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod glob;
#[cfg(feature = "local")]
mod local;
mod memory;
mod object;
mod open;
pub mod path;
mod sync;

#[cfg(feature = "s3")]
mod s3;

#[cfg(test)]
mod testing;

pub use glob::GlobPattern;
#[cfg(feature = "local")]
pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
pub use object::{ListObjectsResponse, Object, ObjectClient};
pub use open::{OpenMode, OpenedFile};
pub use sync::{Datasets, PathKind};

#[cfg(feature = "s3")]
pub use s3::{S3Config, S3ObjectStore};
