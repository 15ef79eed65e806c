//! BIM group API implementation

use crate::api::{ApiError, Client};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Request body for creating groups
#[derive(Debug, Clone, Serialize)]
pub struct CreateGroupRequest {
    pub iamid: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Request body for updating groups
#[derive(Debug, Clone, Serialize)]
pub struct UpdateGroupRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BimGroup {
    pub id: i64,
    #[serde(default)]
    pub iamid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub authorizations: Option<HashMap<String, serde_json::Value>>,
}

/// Groups API for BIM group operations
pub struct GroupsApi<'a> {
    client: &'a Client,
}

impl<'a> GroupsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /bim/group/{id}
    pub async fn get(&self, id: i64) -> Result<BimGroup, ApiError> {
        self.client.get(&format!("/bim/group/{}", id)).await
    }

    /// GET /bim/group/{id}, false on 404
    pub async fn exists(&self, id: i64) -> Result<bool, ApiError> {
        self.client.exists(&format!("/bim/group/{}", id)).await
    }

    /// POST /bim/group
    pub async fn create(&self, request: &CreateGroupRequest) -> Result<BimGroup, ApiError> {
        self.client.post("/bim/group", request).await
    }

    /// PUT /bim/group/{id}
    pub async fn update(&self, id: i64, request: &UpdateGroupRequest) -> Result<BimGroup, ApiError> {
        self.client
            .put(&format!("/bim/group/{}", id), request)
            .await
    }

    /// DELETE /bim/group/{id}
    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.client
            .delete::<Option<serde_json::Value>>(&format!("/bim/group/{}", id))
            .await
            .map(|_| ())
    }
}
