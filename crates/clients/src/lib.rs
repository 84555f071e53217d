//! Clients - REST clients for the Faculty platform services
//!
//! Each client wraps one service behind an [`HttpClient`]:
//! - [`JobClient`] for jobs, runs and subruns
//! - [`ExperimentClient`] for experiments and experiment runs
//! - [`ProjectClient`] for project lookup
//!
//! Experiment runs can also be queried with a [`Filter`] built from
//! conditions joined by `&` and `|`, ordered by a list of [`Sort`] keys.
//!
//! Responses are decoded into typed models; a response that does not match
//! its model fails with `Error::Schema`. List endpoints return a single
//! page, and every client offers a `list_all_*` variant that drains the
//! remaining pages.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use clients::{JobClient, ReqwestHttpClient};
//! use platform_core::{ProjectContext, SdkConfig};
//!
//! # async fn example() -> platform_core::Result<()> {
//! let http = Arc::new(ReqwestHttpClient::new(SdkConfig::from_env())?);
//! let context = ProjectContext::from_env()?;
//! let jobs = JobClient::new(http);
//! if let Some(project_id) = context.project_id {
//!     for job in jobs.list(project_id).await? {
//!         println!("{} {}", job.id, job.metadata.name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod experiment;
pub mod filter;
pub mod job;
pub mod project;
mod resolvers;
mod transport;

#[cfg(feature = "http")]
mod http;

#[cfg(test)]
mod mock;

pub use experiment::{ExperimentClient, ExperimentRun, ExperimentRunStatus, LifecycleStage};
pub use filter::{
    ComparisonOperator, Condition, Filter, FilterValue, LogicalOperator, Sort, SortOrder,
};
pub use job::{JobClient, RunState, SubrunState};
pub use project::{Project, ProjectClient};
pub use resolvers::resolve_project_id;
pub use transport::{HttpClient, Query};

#[cfg(feature = "http")]
pub use http::ReqwestHttpClient;
