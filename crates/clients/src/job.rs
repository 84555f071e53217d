//! Job service client: jobs, runs and subruns

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use platform_core::{
    drain_all, JobId, ListResponse, PageSource, Pagination, ProjectId, Result, RunId, SdkConfig,
    SubrunId,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::transport::{decode, HttpClient, Query};

const SERVICE_NAME: &str = "steve";

/// Name and description of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub name: String,
    pub description: String,
}

/// A job as returned by the job listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    #[serde(rename = "jobId")]
    pub id: JobId,
    #[serde(rename = "meta")]
    pub metadata: JobMetadata,
}

/// Lifecycle state of a job run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    Queued,
    Starting,
    Running,
    Completed,
    Failed,
    Cancelled,
    Error,
}

/// Lifecycle state of a single subrun within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubrunState {
    Queued,
    Starting,
    Running,
    CommandSucceeded,
    CommandFailed,
    Cancelled,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    #[serde(rename = "runId")]
    pub id: RunId,
    pub run_number: u64,
    pub state: RunState,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubrunSummary {
    #[serde(rename = "subrunId")]
    pub id: SubrunId,
    pub subrun_number: u64,
    pub state: SubrunState,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

/// A run together with its subruns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    #[serde(rename = "runId")]
    pub id: RunId,
    pub run_number: u64,
    pub state: RunState,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub subruns: Vec<SubrunSummary>,
}

pub type ListRunsResponse = ListResponse<RunSummary>;

#[derive(Deserialize)]
struct RunIdBody {
    #[serde(rename = "runId")]
    run_id: RunId,
}

#[derive(Deserialize)]
struct ListRunsBody {
    runs: Vec<RunSummary>,
    pagination: Pagination,
}

impl From<ListRunsBody> for ListRunsResponse {
    fn from(body: ListRunsBody) -> Self {
        ListResponse::new(body.runs, body.pagination)
    }
}

fn parameter_values_body(runs: &[&[(&str, &str)]]) -> serde_json::Value {
    let values: Vec<Vec<serde_json::Value>> = runs
        .iter()
        .map(|params| {
            params
                .iter()
                .map(|(name, value)| json!({"name": name, "value": value}))
                .collect()
        })
        .collect();
    json!({ "parameterValues": values })
}

/// Client for the job service
#[derive(Clone)]
pub struct JobClient {
    http: Arc<dyn HttpClient>,
    default_limit: Option<u64>,
}

impl JobClient {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            default_limit: None,
        }
    }

    /// Client whose list calls default to `config.default_page_limit`
    pub fn from_config(http: Arc<dyn HttpClient>, config: &SdkConfig) -> Self {
        Self::new(http).with_default_limit(config.default_page_limit)
    }

    /// Page size to request when a call gives no explicit limit
    pub fn with_default_limit(mut self, limit: Option<u64>) -> Self {
        self.default_limit = limit;
        self
    }

    /// List the jobs in a project
    #[instrument(skip(self))]
    pub async fn list(&self, project_id: ProjectId) -> Result<Vec<JobSummary>> {
        let endpoint = format!("/project/{}/job", project_id);
        decode(self.http.get(SERVICE_NAME, &endpoint, &[]).await?)
    }

    /// Submit a single run of a job with the given parameter values
    #[instrument(skip(self, parameter_values))]
    pub async fn create_run(
        &self,
        project_id: ProjectId,
        job_id: JobId,
        parameter_values: &[(&str, &str)],
    ) -> Result<RunId> {
        self.create_run_array(project_id, job_id, &[parameter_values])
            .await
    }

    /// Submit a run with one subrun per parameter set
    #[instrument(skip(self, parameter_value_sets))]
    pub async fn create_run_array(
        &self,
        project_id: ProjectId,
        job_id: JobId,
        parameter_value_sets: &[&[(&str, &str)]],
    ) -> Result<RunId> {
        let endpoint = format!("/project/{}/job/{}/run", project_id, job_id);
        let body = parameter_values_body(parameter_value_sets);
        let response: RunIdBody = decode(self.http.post(SERVICE_NAME, &endpoint, &body).await?)?;
        debug!(run_id = %response.run_id, subruns = parameter_value_sets.len(), "Run created");
        Ok(response.run_id)
    }

    /// Fetch one page of a job's runs
    ///
    /// When the returned `pagination.next` is set, pass its `start` and
    /// `limit` back in to get the following page, or use
    /// [`JobClient::list_all_runs`].
    #[instrument(skip(self))]
    pub async fn list_runs(
        &self,
        project_id: ProjectId,
        job_id: JobId,
        start: Option<u64>,
        limit: Option<u64>,
    ) -> Result<ListRunsResponse> {
        let mut query = Query::new();
        if let Some(start) = start {
            query.push(("start".to_string(), start.to_string()));
        }
        if let Some(limit) = limit.or(self.default_limit) {
            query.push(("limit".to_string(), limit.to_string()));
        }

        let endpoint = format!("/project/{}/job/{}/run", project_id, job_id);
        let body: ListRunsBody = decode(self.http.get(SERVICE_NAME, &endpoint, &query).await?)?;
        Ok(body.into())
    }

    /// Fetch every run of a job, following pagination to the end
    pub async fn list_all_runs(
        &self,
        project_id: ProjectId,
        job_id: JobId,
    ) -> Result<Vec<RunSummary>> {
        drain_all(&JobRuns {
            client: self,
            project_id,
            job_id,
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_run(&self, project_id: ProjectId, job_id: JobId, run_id: RunId) -> Result<Run> {
        let endpoint = format!("/project/{}/job/{}/run/{}", project_id, job_id, run_id);
        decode(self.http.get(SERVICE_NAME, &endpoint, &[]).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_subrun(
        &self,
        project_id: ProjectId,
        job_id: JobId,
        run_id: RunId,
        subrun_id: SubrunId,
    ) -> Result<SubrunSummary> {
        let endpoint = format!(
            "/project/{}/job/{}/run/{}/subrun/{}",
            project_id, job_id, run_id, subrun_id
        );
        decode(self.http.get(SERVICE_NAME, &endpoint, &[]).await?)
    }
}

/// The runs of one job, viewed as a paged source
struct JobRuns<'a> {
    client: &'a JobClient,
    project_id: ProjectId,
    job_id: JobId,
}

#[async_trait]
impl PageSource<RunSummary> for JobRuns<'_> {
    async fn fetch_page(&self, start: Option<u64>, limit: Option<u64>) -> Result<ListRunsResponse> {
        self.client
            .list_runs(self.project_id, self.job_id, start, limit)
            .await
    }
}
