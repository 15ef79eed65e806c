//! Purpose API implementation

use crate::api::common::ApiQueryParams;
use crate::api::{ApiError, Client};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Purpose {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acknowledgement: String,
}

/// Request body for the purpose upsert
#[derive(Debug, Clone, Default, Serialize)]
pub struct PurposeInput {
    #[serde(flatten)]
    pub purpose: Purpose,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subpurposes: Vec<Purpose>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurposeResponse {
    pub id: i64,
    #[serde(flatten)]
    pub purpose: Purpose,
    #[serde(default)]
    pub subpurposes: Vec<Purpose>,
    #[serde(default)]
    pub display_acknowledgement: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub system_generated: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertPurposeResponse {
    pub purpose_id: i64,
    #[serde(default)]
    pub creating: bool,
    #[serde(default)]
    pub updating: bool,
}

#[derive(Debug, Deserialize)]
pub struct PurposeList {
    #[serde(default)]
    pub purposes: Vec<PurposeResponse>,
    #[serde(default)]
    pub count: u32,
}

pub struct PurposesApi<'a> {
    client: &'a Client,
}

impl<'a> PurposesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /governance/purpose?noLimit=false
    pub async fn list(&self) -> Result<PurposeList, ApiError> {
        self.client
            .get_with_params(
                "/governance/purpose",
                &ApiQueryParams::new().add("noLimit", false),
            )
            .await
    }

    /// GET /governance/purpose/{id}?includeSubpurposes=true
    pub async fn get(&self, id: i64) -> Result<PurposeResponse, ApiError> {
        self.client
            .get_with_params(
                &format!("/governance/purpose/{}", id),
                &ApiQueryParams::new().add("includeSubpurposes", true),
            )
            .await
    }

    /// POST /api/v2/purpose
    pub async fn upsert(&self, input: &PurposeInput) -> Result<UpsertPurposeResponse, ApiError> {
        self.client.post("/api/v2/purpose", input).await
    }

    /// DELETE /governance/purpose/{id}
    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.client
            .delete::<Option<serde_json::Value>>(&format!("/governance/purpose/{}", id))
            .await
            .map(|_| ())
    }
}
