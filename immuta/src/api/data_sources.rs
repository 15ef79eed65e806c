//! Data source (connection registration) API implementation

use crate::api::common::{segment, ApiQueryParams};
use crate::api::{ApiError, Client};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameTemplate {
    pub data_source_format: String,
    pub table_format: String,
    pub schema_format: String,
    pub schema_project_name_format: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceOptions {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub table_tags: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disable_sensitive_data_discovery: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Owner {
    /// `user` or `group`
    #[serde(rename = "type")]
    pub owner_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iam: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFile {
    pub key: String,
    pub content: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub handler: String,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_files: Vec<UserFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string_options: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ssl: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_path: Option<String>,
}

/// Request body for `POST /api/v2/data`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceInput {
    pub connection_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_template: Option<NameTemplate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<DataSourceOptions>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub owners: Vec<Owner>,
    pub connection: Connection,
}

/// Summary of what a registration changed, or would change on a dry run
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceResponse {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub creating: Vec<String>,
    #[serde(default)]
    pub updating: Vec<String>,
    #[serde(default)]
    pub deleting: Vec<String>,
    #[serde(default)]
    pub no_change: Vec<String>,
    #[serde(default)]
    pub detection_running: bool,
    #[serde(default)]
    pub tags_updated: bool,
}

pub struct DataSourcesApi<'a> {
    client: &'a Client,
}

impl<'a> DataSourcesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// POST /api/v2/data?dryRun=false
    pub async fn upsert(&self, input: &DataSourceInput) -> Result<DataSourceResponse, ApiError> {
        let response: Option<DataSourceResponse> = self
            .client
            .post_with_params(
                "/api/v2/data",
                &ApiQueryParams::new().add("dryRun", false),
                input,
            )
            .await?;
        Ok(response.unwrap_or_default())
    }

    /// DELETE /api/v2/data/{key}?dryRun=true, false on 404
    ///
    /// There is no read endpoint per connection; a dry-run delete reports
    /// whether the connection is registered without touching it.
    pub async fn exists(&self, connection_key: &str) -> Result<bool, ApiError> {
        let result: Result<Option<DataSourceResponse>, ApiError> = self
            .client
            .delete_with_params(
                &format!("/api/v2/data/{}", segment(connection_key)),
                &ApiQueryParams::new().add("dryRun", true),
            )
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// DELETE /api/v2/data/{key}
    pub async fn delete(&self, connection_key: &str) -> Result<(), ApiError> {
        self.client
            .delete::<Option<serde_json::Value>>(&format!(
                "/api/v2/data/{}",
                segment(connection_key)
            ))
            .await
            .map(|_| ())
    }
}
