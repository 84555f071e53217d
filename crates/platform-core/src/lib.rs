//! Platform Core - Foundation for the Faculty platform SDK
//!
//! Provides the shared identifier and pagination types, the error type,
//! SDK configuration and the page-draining protocol used by every list
//! endpoint.

pub mod config;
pub mod error;
pub mod logging;
pub mod pagination;
pub mod types;

pub use config::{DatasetsConfig, ProjectContext, SdkConfig};
pub use error::{Error, Result};
pub use pagination::{drain_all, drain_tokens, PageSource, TokenPage, TokenPageSource};
pub use types::*;
