//! Project service client

use std::sync::Arc;

use platform_core::{ProjectId, Result, UserId};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::transport::{decode, HttpClient};

const SERVICE_NAME: &str = "casebook";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "projectId")]
    pub id: ProjectId,
    pub name: String,
    pub owner_id: UserId,
}

#[derive(Clone)]
pub struct ProjectClient {
    http: Arc<dyn HttpClient>,
}

impl ProjectClient {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    /// List every project the user can access
    #[instrument(skip(self))]
    pub async fn list_accessible_by_user(&self, user_id: UserId) -> Result<Vec<Project>> {
        let endpoint = format!("/user/{}", user_id);
        decode(self.http.get(SERVICE_NAME, &endpoint, &[]).await?)
    }
}
