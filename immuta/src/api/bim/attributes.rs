//! BIM authorization (attribute) API implementation

use crate::api::common::segment;
use crate::api::{ApiError, Client};
use serde::Deserialize;
use std::collections::HashMap;

/// Identifies the user or group an attribute is attached to
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeTarget {
    pub iam_id: String,
    /// `user` or `group`
    pub model_type: String,
    pub model_id: String,
}

impl AttributeTarget {
    fn path(&self) -> String {
        format!(
            "/bim/iam/{}/{}/{}",
            segment(&self.iam_id),
            segment(&self.model_type),
            segment(&self.model_id)
        )
    }

    fn authorization_path(&self, key: &str, value: &str) -> String {
        format!(
            "{}/authorizations/{}/{}",
            self.path(),
            segment(key),
            segment(value)
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorizations {
    #[serde(default)]
    pub bim_authorizations: HashMap<String, Vec<String>>,
}

impl Authorizations {
    /// Immuta stores keys lowercased
    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.bim_authorizations
            .get(&key.to_lowercase())
            .is_some_and(|values| values.iter().any(|v| v == value))
    }
}

pub struct AttributesApi<'a> {
    client: &'a Client,
}

impl<'a> AttributesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /bim/iam/{iam}/{type}/{id}
    pub async fn get(&self, target: &AttributeTarget) -> Result<Authorizations, ApiError> {
        self.client.get(&target.path()).await
    }

    /// PUT /bim/iam/{iam}/{type}/{id}/authorizations/{key}/{value}
    pub async fn add(
        &self,
        target: &AttributeTarget,
        key: &str,
        value: &str,
    ) -> Result<(), ApiError> {
        self.client
            .put_empty::<Option<serde_json::Value>>(&target.authorization_path(key, value))
            .await
            .map(|_| ())
    }

    /// DELETE /bim/iam/{iam}/{type}/{id}/authorizations/{key}/{value}
    pub async fn remove(
        &self,
        target: &AttributeTarget,
        key: &str,
        value: &str,
    ) -> Result<(), ApiError> {
        self.client
            .delete::<Option<serde_json::Value>>(&target.authorization_path(key, value))
            .await
            .map(|_| ())
    }
}
