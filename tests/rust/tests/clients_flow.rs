//! Client workflows against a scripted platform
//!
//! The scripted transport answers list endpoints in fixed-size windows so
//! the drain helpers have to walk several pages.

use anyhow::Result;
use async_trait::async_trait;
use clients::{ExperimentClient, HttpClient, JobClient, ProjectClient, RunState};
use platform_core::{Error, ProjectContext, ProjectId};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const PAGE: usize = 2;

struct ScriptedPlatform {
    runs: Vec<Value>,
    projects: Vec<Value>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedPlatform {
    fn new(runs: Vec<Value>, projects: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            runs,
            projects,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn window(&self, query: &[(String, String)]) -> Value {
        let param = |name: &str| {
            query
                .iter()
                .find(|(k, _)| k == name)
                .and_then(|(_, v)| v.parse::<usize>().ok())
        };
        let start = param("start").unwrap_or(0);
        let limit = param("limit").unwrap_or(PAGE);
        let end = (start + limit).min(self.runs.len());

        let mut pagination = json!({"start": start, "size": end - start});
        if end < self.runs.len() {
            pagination["next"] = json!({"start": end, "limit": limit});
        }
        json!({"runs": self.runs[start..end].to_vec(), "pagination": pagination})
    }
}

#[async_trait]
impl HttpClient for ScriptedPlatform {
    async fn get(
        &self,
        service: &str,
        endpoint: &str,
        query: &[(String, String)],
    ) -> platform_core::Result<Value> {
        let rendered: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        self.requests
            .lock()
            .unwrap()
            .push(format!("GET {}{}?{}", service, endpoint, rendered.join("&")));

        if endpoint.starts_with("/user/") {
            return Ok(Value::Array(self.projects.clone()));
        }
        if endpoint.ends_with("/run") {
            return Ok(self.window(query));
        }
        Err(Error::Http {
            status: 404,
            message: format!("no route for {}", endpoint),
        })
    }

    async fn post(&self, service: &str, endpoint: &str, _body: &Value) -> platform_core::Result<Value> {
        self.requests
            .lock()
            .unwrap()
            .push(format!("POST {}{}", service, endpoint));
        Err(Error::Http {
            status: 405,
            message: "read-only platform".to_string(),
        })
    }
}

fn job_run(number: u64) -> Value {
    json!({
        "runId": Uuid::new_v4(),
        "runNumber": number,
        "state": "completed",
        "submittedAt": "2024-03-01T10:00:00Z",
        "startedAt": "2024-03-01T10:00:05Z",
        "endedAt": "2024-03-01T10:10:00Z",
    })
}

fn experiment_run(number: u64) -> Value {
    json!({
        "runId": Uuid::new_v4(),
        "runNumber": number,
        "experimentId": 7,
        "artifactLocation": "scheme:///artifacts",
        "status": "finished",
        "startedAt": "2024-03-01T10:00:00Z",
        "tags": [],
        "params": [{"key": "lr", "value": "0.01"}],
        "metrics": [],
    })
}

#[tokio::test]
async fn test_job_runs_drain_across_pages() -> Result<()> {
    let platform = ScriptedPlatform::new((1..=5).map(job_run).collect(), vec![]);
    let jobs = JobClient::new(platform.clone());
    let project = ProjectId::new(Uuid::new_v4());
    let job = Uuid::new_v4();

    let runs = jobs.list_all_runs(project, job).await?;
    let numbers: Vec<u64> = runs.iter().map(|r| r.run_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    assert!(runs.iter().all(|r| r.state == RunState::Completed));
    assert_eq!(platform.requests().len(), 3);

    let first = jobs.list_runs(project, job, None, None).await?;
    assert_eq!(first.items.len(), PAGE);
    assert!(first.pagination.next.is_some());
    Ok(())
}

#[tokio::test]
async fn test_experiment_runs_filtering() -> Result<()> {
    let platform = ScriptedPlatform::new((1..=3).map(experiment_run).collect(), vec![]);
    let experiments = ExperimentClient::new(platform.clone());
    let project = ProjectId::new(Uuid::new_v4());

    let empty = experiments
        .list_runs(project, Some(&[]), None, None, None)
        .await?;
    assert!(empty.items.is_empty());
    assert!(empty.pagination.next.is_none());
    assert!(platform.requests().is_empty());

    let runs = experiments.list_all_runs(project, Some(&[7])).await?;
    assert_eq!(runs.len(), 3);
    assert!(platform
        .requests()
        .iter()
        .all(|r| r.contains("experimentId=7")));
    Ok(())
}

#[tokio::test]
async fn test_resolve_project_by_name() -> Result<()> {
    let wanted = Uuid::new_v4();
    let owner = Uuid::new_v4();
    let platform = ScriptedPlatform::new(
        vec![],
        vec![
            json!({"projectId": wanted, "name": "forecasting", "ownerId": owner}),
            json!({"projectId": Uuid::new_v4(), "name": "churn", "ownerId": owner}),
        ],
    );
    let projects = ProjectClient::new(platform.clone());
    let context = ProjectContext {
        project_id: None,
        user_id: Some(owner),
    };

    let resolved = clients::resolve_project_id(&projects, &context, Some("forecasting")).await?;
    assert_eq!(resolved, ProjectId::new(wanted));

    let missing = clients::resolve_project_id(&projects, &context, Some("unknown")).await;
    assert!(matches!(missing, Err(Error::ProjectResolution { .. })));
    Ok(())
}
