//! Tag API implementation

use crate::api::common::{segment, ApiQueryParams};
use crate::api::{ApiError, Client};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagName {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootTag {
    pub name: String,
    pub delete_hierarchy: bool,
}

/// Request body for creating tags
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTagRequest {
    pub tags: Vec<TagName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_tag: Option<RootTag>,
}

impl CreateTagRequest {
    pub fn single(name: &str, root: Option<&str>) -> Self {
        Self {
            tags: vec![TagName {
                name: name.to_string(),
            }],
            root_tag: root.filter(|r| !r.is_empty()).map(|r| RootTag {
                name: r.to_string(),
                delete_hierarchy: false,
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub has_leaf_nodes: bool,
    #[serde(default)]
    pub display_name: Option<String>,
}

pub struct TagsApi<'a> {
    client: &'a Client,
}

impl<'a> TagsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// POST /tag
    pub async fn create(&self, request: &CreateTagRequest) -> Result<Vec<Tag>, ApiError> {
        self.client.post("/tag", request).await
    }

    /// GET /tag?searchText={name}
    pub async fn search(&self, text: &str) -> Result<Vec<Tag>, ApiError> {
        let tags: Option<Vec<Tag>> = self
            .client
            .get_with_params("/tag", &ApiQueryParams::new().add("searchText", text))
            .await?;
        Ok(tags.unwrap_or_default())
    }

    /// Exact name match among the search results; tags cannot be fetched by id
    pub async fn find(&self, name: &str) -> Result<Option<Tag>, ApiError> {
        Ok(self
            .search(name)
            .await?
            .into_iter()
            .find(|tag| tag.name == name))
    }

    /// DELETE /tag/{name}
    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        self.client
            .delete::<Option<serde_json::Value>>(&format!("/tag/{}", segment(name)))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[test]
    fn root_tag_is_omitted_when_empty() {
        assert_eq!(
            serde_json::to_value(CreateTagRequest::single("pii", Some(""))).unwrap(),
            json!({"tags": [{"name": "pii"}]})
        );
        assert_eq!(
            serde_json::to_value(CreateTagRequest::single("ssn", Some("pii"))).unwrap(),
            json!({"tags": [{"name": "ssn"}], "rootTag": {"name": "pii", "deleteHierarchy": false}})
        );
    }

    #[tokio::test]
    async fn find_requires_exact_name() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/tag")
            .match_query(Matcher::UrlEncoded("searchText".into(), "pii".into()))
            .with_body(r#"[{"id":1,"name":"pii.ssn"},{"id":2,"name":"pii"}]"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let tag = client.tags().find("pii").await.unwrap().unwrap();
        assert_eq!(tag.id, 2);
    }

    #[tokio::test]
    async fn find_returns_none_without_match() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/tag")
            .match_query(Matcher::Any)
            .with_body("[]")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        assert!(client.tags().find("pii").await.unwrap().is_none());
    }
}
