//! Project API implementation

use crate::api::common::{segment, ApiQueryParams, NamedRef, SearchResponse};
use crate::api::{ApiError, Client};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Error text of the server bug where an upsert is rejected until the
/// owner's subscription has been acknowledged
pub const ACKNOWLEDGE_ERROR: &str = "You must first acknowledge";

/// Request body for the project upsert
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub name: String,
    pub project_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub allow_masked_joins: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_policy: Option<HashMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub purposes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_key: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub allow_masked_joins: bool,
    #[serde(default)]
    pub subscription_policy: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub tags: Vec<NamedRef>,
    #[serde(default)]
    pub purposes: Vec<NamedRef>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub subscription_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertProjectResponse {
    pub project_id: i64,
    #[serde(default)]
    pub creating: bool,
    #[serde(default)]
    pub updating: bool,
}

pub struct ProjectsApi<'a> {
    client: &'a Client,
}

impl<'a> ProjectsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /project?noLimit=false
    pub async fn list(&self) -> Result<SearchResponse<Project>, ApiError> {
        self.client
            .get_with_params("/project", &ApiQueryParams::new().add("noLimit", false))
            .await
    }

    /// GET /project?searchText={name}&nameOnly=true, first hit
    pub async fn find_by_name(&self, name: &str) -> Result<Project, ApiError> {
        let params = ApiQueryParams::new()
            .add("searchText", name)
            .add("nameOnly", true);
        let found: SearchResponse<Project> = self.client.get_with_params("/project", &params).await?;

        found
            .hits
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("no project named '{}'", name)))
    }

    /// GET /project/{id}
    pub async fn get(&self, id: i64) -> Result<Project, ApiError> {
        self.client.get(&format!("/project/{}", id)).await
    }

    /// POST /api/v2/project
    pub async fn upsert(&self, input: &ProjectInput) -> Result<UpsertProjectResponse, ApiError> {
        self.client.post("/api/v2/project", input).await
    }

    /// POST /project/{id}/members/{subscription}/acknowledge
    pub async fn acknowledge(&self, project_id: i64, subscription_id: i64) -> Result<(), ApiError> {
        self.client
            .post::<Option<serde_json::Value>, _>(
                &format!(
                    "/project/{}/members/{}/acknowledge",
                    project_id, subscription_id
                ),
                &serde_json::json!({}),
            )
            .await
            .map(|_| ())
    }

    /// Upsert, and when the server demands an acknowledgement first,
    /// acknowledge the existing project and upsert exactly once more
    pub async fn upsert_acknowledging(
        &self,
        input: &ProjectInput,
    ) -> Result<UpsertProjectResponse, ApiError> {
        match self.upsert(input).await {
            Err(e) if e.message().contains(ACKNOWLEDGE_ERROR) => {
                tracing::warn!(project = %input.name, "trying to acknowledge the project");
                let found = self.find_by_name(&input.name).await?;
                let project = self.get(found.id).await?;
                self.acknowledge(project.id, project.subscription_id).await?;
                self.upsert(input).await
            }
            result => result,
        }
    }

    /// DELETE /api/v2/project/{projectKey}
    pub async fn delete(&self, project_key: &str) -> Result<(), ApiError> {
        self.client
            .delete::<Option<serde_json::Value>>(&format!(
                "/api/v2/project/{}",
                segment(project_key)
            ))
            .await
            .map(|_| ())
    }
}
