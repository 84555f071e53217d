//! Experiment tracking service client

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use platform_core::{
    drain_all, Error, ExperimentId, ListResponse, PageSource, Pagination, ProjectId, Result, RunId,
    SdkConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::filter::{Filter, Sort};
use crate::transport::{decode, HttpClient, Query};

const SERVICE_NAME: &str = "atlas";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentRunStatus {
    Running,
    Finished,
    Failed,
    Scheduled,
    Killed,
}

/// Whether a run has been soft-deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStage {
    Active,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    #[serde(rename = "experimentId")]
    pub id: ExperimentId,
    pub name: String,
    pub description: String,
    pub artifact_location: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub key: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub step: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRun {
    #[serde(rename = "runId")]
    pub id: RunId,
    pub run_number: u64,
    pub experiment_id: ExperimentId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_run_id: Option<RunId>,
    pub artifact_location: String,
    pub status: ExperimentRunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

pub type ListExperimentRunsResponse = ListResponse<ExperimentRun>;

#[derive(Deserialize)]
struct ListExperimentRunsBody {
    runs: Vec<ExperimentRun>,
    pagination: Pagination,
}

impl From<ListExperimentRunsBody> for ListExperimentRunsResponse {
    fn from(body: ListExperimentRunsBody) -> Self {
        ListResponse::new(body.runs, body.pagination)
    }
}

/// Body of a run query
#[derive(Serialize)]
struct RunQuery<'a> {
    filter: Option<&'a Filter>,
    sort: &'a [Sort],
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<QueryPage>,
}

#[derive(Serialize)]
struct QueryPage {
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u64>,
}

/// Client for the experiment tracking service
#[derive(Clone)]
pub struct ExperimentClient {
    http: Arc<dyn HttpClient>,
    default_limit: Option<u64>,
}

impl ExperimentClient {
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

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        project_id: ProjectId,
        name: &str,
        description: Option<&str>,
        artifact_location: Option<&str>,
    ) -> Result<Experiment> {
        let endpoint = format!("/project/{}/experiment", project_id);
        let body = json!({
            "name": name,
            "description": description,
            "artifactLocation": artifact_location,
        });
        decode(self.http.post(SERVICE_NAME, &endpoint, &body).await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, project_id: ProjectId, experiment_id: ExperimentId) -> Result<Experiment> {
        let endpoint = format!("/project/{}/experiment/{}", project_id, experiment_id);
        decode(self.http.get(SERVICE_NAME, &endpoint, &[]).await?)
    }

    #[instrument(skip(self))]
    pub async fn list(&self, project_id: ProjectId) -> Result<Vec<Experiment>> {
        let endpoint = format!("/project/{}/experiment", project_id);
        decode(self.http.get(SERVICE_NAME, &endpoint, &[]).await?)
    }

    /// Create a run of an experiment
    ///
    /// When `artifact_location` is `None` the experiment's own location is
    /// used by the server.
    #[instrument(skip(self))]
    pub async fn create_run(
        &self,
        project_id: ProjectId,
        experiment_id: ExperimentId,
        started_at: DateTime<Utc>,
        artifact_location: Option<&str>,
    ) -> Result<ExperimentRun> {
        let endpoint = format!("/project/{}/experiment/{}/run", project_id, experiment_id);
        let body = json!({
            "startedAt": started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "artifactLocation": artifact_location,
        });
        let run: ExperimentRun = decode(self.http.post(SERVICE_NAME, &endpoint, &body).await?)?;
        debug!(run_id = %run.id, run_number = run.run_number, "Experiment run created");
        Ok(run)
    }

    #[instrument(skip(self))]
    pub async fn get_run(&self, project_id: ProjectId, run_id: RunId) -> Result<ExperimentRun> {
        let endpoint = format!("/project/{}/run/{}", project_id, run_id);
        decode(self.http.get(SERVICE_NAME, &endpoint, &[]).await?)
    }

    /// Fetch one page of experiment runs
    ///
    /// `experiment_ids` restricts the listing to those experiments. An
    /// explicitly empty set returns an empty page without contacting the
    /// server, since the service would read an empty filter as no filter.
    /// Filtering by `lifecycle_stage` is not supported.
    #[instrument(skip(self))]
    pub async fn list_runs(
        &self,
        project_id: ProjectId,
        experiment_ids: Option<&[ExperimentId]>,
        lifecycle_stage: Option<LifecycleStage>,
        start: Option<u64>,
        limit: Option<u64>,
    ) -> Result<ListExperimentRunsResponse> {
        if lifecycle_stage.is_some() {
            return Err(Error::NotImplemented {
                feature: "lifecycle_stage is not supported".to_string(),
            });
        }

        let mut query = Query::new();
        if let Some(ids) = experiment_ids {
            if ids.is_empty() {
                debug!("Empty experiment id filter, returning empty page");
                return Ok(ListResponse::empty());
            }
            for id in ids {
                query.push(("experimentId".to_string(), id.to_string()));
            }
        }
        if let Some(start) = start {
            query.push(("start".to_string(), start.to_string()));
        }
        if let Some(limit) = limit.or(self.default_limit) {
            query.push(("limit".to_string(), limit.to_string()));
        }

        let endpoint = format!("/project/{}/run", project_id);
        let body: ListExperimentRunsBody =
            decode(self.http.get(SERVICE_NAME, &endpoint, &query).await?)?;
        Ok(body.into())
    }

    /// Fetch every matching experiment run, following pagination to the end
    pub async fn list_all_runs(
        &self,
        project_id: ProjectId,
        experiment_ids: Option<&[ExperimentId]>,
    ) -> Result<Vec<ExperimentRun>> {
        drain_all(&ExperimentRuns {
            client: self,
            project_id,
            experiment_ids,
        })
        .await
    }

    /// Fetch one page of runs matching `filter`, ordered by `sort`
    ///
    /// With no filter every run in the project matches. The page is left
    /// to the server when neither `start` nor a limit is known.
    #[instrument(skip(self, filter, sort))]
    pub async fn query_runs(
        &self,
        project_id: ProjectId,
        filter: Option<&Filter>,
        sort: &[Sort],
        start: Option<u64>,
        limit: Option<u64>,
    ) -> Result<ListExperimentRunsResponse> {
        let limit = limit.or(self.default_limit);
        let page = (start.is_some() || limit.is_some()).then_some(QueryPage { start, limit });
        let body = serde_json::to_value(RunQuery { filter, sort, page })?;

        let endpoint = format!("/project/{}/run/query", project_id);
        let body: ListExperimentRunsBody =
            decode(self.http.post(SERVICE_NAME, &endpoint, &body).await?)?;
        debug!(count = body.runs.len(), "Queried experiment runs");
        Ok(body.into())
    }

    /// Fetch every run matching `filter`, following pagination to the end
    pub async fn query_all_runs(
        &self,
        project_id: ProjectId,
        filter: Option<&Filter>,
        sort: &[Sort],
    ) -> Result<Vec<ExperimentRun>> {
        drain_all(&QueriedRuns {
            client: self,
            project_id,
            filter,
            sort,
        })
        .await
    }
}

struct QueriedRuns<'a> {
    client: &'a ExperimentClient,
    project_id: ProjectId,
    filter: Option<&'a Filter>,
    sort: &'a [Sort],
}

#[async_trait]
impl PageSource<ExperimentRun> for QueriedRuns<'_> {
    async fn fetch_page(
        &self,
        start: Option<u64>,
        limit: Option<u64>,
    ) -> Result<ListExperimentRunsResponse> {
        self.client
            .query_runs(self.project_id, self.filter, self.sort, start, limit)
            .await
    }
}

struct ExperimentRuns<'a> {
    client: &'a ExperimentClient,
    project_id: ProjectId,
    experiment_ids: Option<&'a [ExperimentId]>,
}

#[async_trait]
impl PageSource<ExperimentRun> for ExperimentRuns<'_> {
    async fn fetch_page(
        &self,
        start: Option<u64>,
        limit: Option<u64>,
    ) -> Result<ListExperimentRunsResponse> {
        self.client
            .list_runs(self.project_id, self.experiment_ids, None, start, limit)
            .await
    }
}
