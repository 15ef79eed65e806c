//! BIM user API implementation

use crate::api::common::segment;
use crate::api::{ApiError, Client};
use serde::{Deserialize, Serialize};

const USERS_PATH: &str = "/bim/iam/bim/user";

/// Request body for creating users
#[derive(Debug, Clone, Serialize)]
pub struct CreateUserRequest {
    pub userid: String,
    pub password: String,
    pub profile: UserProfileInput,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfileInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalUserIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snowflake_user: Option<String>,
}

/// Profile as stored by Immuta, also the body of profile updates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_user_ids: Option<ExternalUserIds>,
}

impl UserProfile {
    pub fn snowflake_user(&self) -> Option<&str> {
        self.external_user_ids
            .as_ref()
            .and_then(|ids| ids.snowflake_user.as_deref())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BimUser {
    #[serde(default)]
    pub userid: String,
    #[serde(default)]
    pub iamid: String,
    #[serde(default)]
    pub profile: UserProfile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserResponse {
    pub new_user: Option<BimUser>,
}

#[derive(Debug, Deserialize)]
pub struct UserList {
    #[serde(default)]
    pub users: Vec<BimUser>,
    #[serde(default)]
    pub count: u32,
}

/// Users API for BIM user operations
pub struct UsersApi<'a> {
    client: &'a Client,
}

impl<'a> UsersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /bim/iam/bim/user
    pub async fn list(&self) -> Result<UserList, ApiError> {
        self.client.get(USERS_PATH).await
    }

    /// GET /bim/iam/bim/user/{userid}
    pub async fn get(&self, userid: &str) -> Result<BimUser, ApiError> {
        self.client
            .get(&format!("{}/{}", USERS_PATH, segment(userid)))
            .await
    }

    /// POST /bim/iam/bim/user
    pub async fn create(&self, request: &CreateUserRequest) -> Result<CreateUserResponse, ApiError> {
        self.client.post(USERS_PATH, request).await
    }

    /// PUT /bim/iam/bim/user/{userid}/profile
    pub async fn update_profile(
        &self,
        userid: &str,
        profile: &UserProfile,
    ) -> Result<BimUser, ApiError> {
        self.client
            .put(
                &format!("{}/{}/profile", USERS_PATH, segment(userid)),
                profile,
            )
            .await
    }

    /// DELETE /bim/iam/bim/user/{userid}
    pub async fn delete(&self, userid: &str) -> Result<(), ApiError> {
        self.client
            .delete::<Option<serde_json::Value>>(&format!("{}/{}", USERS_PATH, segment(userid)))
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

    #[tokio::test]
    async fn list_returns_users() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/bim/iam/bim/user")
            .with_body(
                r#"{"users":[{"userid":"alice","iamid":"bim","profile":{"name":"Alice"}},
                             {"userid":"bob","iamid":"bim"}],"count":2}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let list = client.bim().users().list().await.unwrap();

        assert_eq!(list.count, 2);
        assert_eq!(list.users[0].profile.name.as_deref(), Some("Alice"));
        assert_eq!(list.users[1].profile.name, None);
    }

    #[tokio::test]
    async fn create_posts_profile() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/bim/iam/bim/user")
            .match_body(Matcher::Json(json!({
                "userid": "jdoe",
                "password": "secret",
                "profile": {"name": "Jane Doe"}
            })))
            .with_body(r#"{"newUser":{"userid":"jdoe","iamid":"bim","profile":{"name":"Jane Doe"}}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let response = client
            .bim()
            .users()
            .create(&CreateUserRequest {
                userid: "jdoe".to_string(),
                password: "secret".to_string(),
                profile: UserProfileInput {
                    name: Some("Jane Doe".to_string()),
                    email: None,
                },
            })
            .await
            .unwrap();

        let user = response.new_user.unwrap();
        assert_eq!(user.userid, "jdoe");
        assert_eq!(user.iamid, "bim");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_escapes_userid() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/bim/iam/bim/user/jane%40example.com")
            .with_body(
                r#"{"userid":"jane@example.com","profile":{"externalUserIds":{"snowflakeUser":"JANE"}}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let user = client.bim().users().get("jane@example.com").await.unwrap();

        assert_eq!(user.profile.snowflake_user(), Some("JANE"));
        mock.assert_async().await;
    }

    #[test]
    fn profile_update_serializes_external_ids() {
        let profile = UserProfile {
            name: Some("Jane".to_string()),
            email: None,
            external_user_ids: Some(ExternalUserIds {
                snowflake_user: Some("JANE".to_string()),
            }),
        };

        assert_eq!(
            serde_json::to_value(&profile).unwrap(),
            json!({"name": "Jane", "externalUserIds": {"snowflakeUser": "JANE"}})
        );
    }
}
