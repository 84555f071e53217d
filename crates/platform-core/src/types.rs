//! Core type definitions shared across the SDK

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Unique identifier types
pub type UserId = Uuid;
pub type JobId = Uuid;
pub type RunId = Uuid;
pub type SubrunId = Uuid;
pub type ExperimentId = i64;

/// Identifier of the project that scopes every request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(Uuid);

impl ProjectId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for ProjectId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for ProjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| Error::InvalidConfig {
                message: format!("invalid project id {:?}: {}", s, e),
            })
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One retrievable window of a paged listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub start: u64,
    pub limit: u64,
}

/// The server's report of the window actually returned
///
/// `next` is `None` exactly when no further results exist. Keys omitted
/// on the wire decode to `None`, never to a zeroed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub start: u64,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Page>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Page>,
}

impl Pagination {
    /// Pagination of an empty first page with nothing before or after it
    pub fn empty() -> Self {
        Self {
            start: 0,
            size: 0,
            previous: None,
            next: None,
        }
    }

    /// Whether this is the final page of the listing
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

/// A single page of a list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    /// Items in server order
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> ListResponse<T> {
    pub fn new(items: Vec<T>, pagination: Pagination) -> Self {
        Self { items, pagination }
    }

    /// An empty page, returned without contacting the server
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            pagination: Pagination::empty(),
        }
    }
}
