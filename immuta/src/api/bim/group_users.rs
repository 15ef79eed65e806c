//! BIM group membership API implementation

use crate::api::common::SearchResponse;
use crate::api::{ApiError, Client};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberProfile {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// One membership as listed under `/bim/group/{id}/user`
#[derive(Debug, Clone, Deserialize)]
pub struct GroupMember {
    pub id: i64,
    pub group: i64,
    #[serde(default)]
    pub profile: MemberProfile,
    #[serde(default)]
    pub userid: String,
    #[serde(default)]
    pub iamid: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddMemberRequest {
    pub userid: String,
    pub iamid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddMemberResponse {
    pub id: i64,
    pub group: i64,
    #[serde(default)]
    pub profile: i64,
}

/// Membership operations scoped to one group
pub struct GroupUsersApi<'a> {
    client: &'a Client,
    group_id: i64,
}

impl<'a> GroupUsersApi<'a> {
    pub fn new(client: &'a Client, group_id: i64) -> Self {
        Self { client, group_id }
    }

    /// GET /bim/group/{group}/user
    pub async fn list(&self) -> Result<SearchResponse<GroupMember>, ApiError> {
        self.client
            .get(&format!("/bim/group/{}/user", self.group_id))
            .await
    }

    /// POST /bim/group/{group}/user
    pub async fn add(&self, request: &AddMemberRequest) -> Result<AddMemberResponse, ApiError> {
        self.client
            .post(&format!("/bim/group/{}/user", self.group_id), request)
            .await
    }

    /// DELETE /bim/group/{group}/user/{membership}
    pub async fn remove(&self, membership_id: i64) -> Result<(), ApiError> {
        self.client
            .delete::<Option<serde_json::Value>>(&format!(
                "/bim/group/{}/user/{}",
                self.group_id, membership_id
            ))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::Server;

    #[tokio::test]
    async fn list_reads_hits() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/bim/group/5/user")
            .with_body(
                r#"{"count":1,"hits":[{"id":40,"group":5,"userid":"jdoe","iamid":"bim","profile":{"id":9,"name":"Jane"}}]}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let members = client.bim().group_users(5).list().await.unwrap();

        assert_eq!(members.count, 1);
        assert_eq!(members.hits[0].profile.id, 9);
        assert_eq!(members.hits[0].userid, "jdoe");
    }

    #[tokio::test]
    async fn remove_targets_membership() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/bim/group/5/user/40")
            .with_body("{}")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        client.bim().group_users(5).remove(40).await.unwrap();
        mock.assert_async().await;
    }
}
