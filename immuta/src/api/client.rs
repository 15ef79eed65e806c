use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::common::ApiQueryParams;
use super::error::ApiError;

pub const DEFAULT_USER_AGENT: &str =
    "HashiCorp Terraform/immuta (+https://www.terraform.io) Terraform Plugin SDK/immuta";

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Immuta API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Create a client for `host`, either a bare host name or an http(s) URL
    pub fn new(host: &str, api_key: &str) -> Result<Self, ApiError> {
        let base_url = normalize_host(host)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| ApiError::InvalidApiKey(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        // Idle connections are closed between calls
        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// BIM (identity management) operations
    pub fn bim(&self) -> crate::api::bim::BimApi<'_> {
        crate::api::bim::BimApi::new(self)
    }

    pub fn projects(&self) -> crate::api::projects::ProjectsApi<'_> {
        crate::api::projects::ProjectsApi::new(self)
    }

    pub fn purposes(&self) -> crate::api::purposes::PurposesApi<'_> {
        crate::api::purposes::PurposesApi::new(self)
    }

    pub fn tags(&self) -> crate::api::tags::TagsApi<'_> {
        crate::api::tags::TagsApi::new(self)
    }

    pub fn data_sources(&self) -> crate::api::data_sources::DataSourcesApi<'_> {
        crate::api::data_sources::DataSourcesApi::new(self)
    }

    /// Execute a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::GET, path, None, None::<&()>).await
    }

    /// Execute a GET request with query parameters
    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &ApiQueryParams,
    ) -> Result<T, ApiError> {
        self.execute(Method::GET, path, Some(params), None::<&()>)
            .await
    }

    /// Execute a HEAD request, succeeding on any 2xx status
    pub async fn head(&self, path: &str) -> Result<(), ApiError> {
        self.execute(Method::HEAD, path, None, None::<&()>).await
    }

    /// Execute a POST request with a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(Method::POST, path, None, Some(body)).await
    }

    /// Execute a POST request with query parameters and a JSON body
    pub async fn post_with_params<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        params: &ApiQueryParams,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(Method::POST, path, Some(params), Some(body))
            .await
    }

    /// Execute a PUT request with a JSON body
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(Method::PUT, path, None, Some(body)).await
    }

    /// Execute a PUT request without a body
    pub async fn put_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::PUT, path, None, None::<&()>).await
    }

    /// Execute a PATCH request with a JSON body
    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(Method::PATCH, path, None, Some(body)).await
    }

    /// Execute a DELETE request
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::DELETE, path, None, None::<&()>).await
    }

    /// Execute a DELETE request with query parameters
    pub async fn delete_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &ApiQueryParams,
    ) -> Result<T, ApiError> {
        self.execute(Method::DELETE, path, Some(params), None::<&()>)
            .await
    }

    /// GET `path`, mapping 404 to `Ok(false)`
    pub async fn exists(&self, path: &str) -> Result<bool, ApiError> {
        match self.get::<serde_json::Value>(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn execute<T, B>(
        &self,
        method: Method,
        path: &str,
        params: Option<&ApiQueryParams>,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let query = params.map(|p| p.to_query_string()).unwrap_or_default();
        let url = format!("{}{}{}", self.inner.base_url, path, query);

        tracing::debug!("{} request to: {}", method, url);

        let mut request = self.inner.http_client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("Response status: {}", status);

        if status.is_client_error() || status.is_server_error() {
            return self.handle_error_response(response).await;
        }

        self.parse_success_response(response).await
    }

    /// Parse successful response, treating an empty body as JSON null
    async fn parse_success_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::debug!("API response body: {}", text);

        let body = if text.trim().is_empty() {
            "null"
        } else {
            text.as_str()
        };

        serde_json::from_str::<T>(body).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }

    async fn handle_error_response<T>(&self, response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        tracing::debug!("API error response ({}): {}", status, text);

        if status == 404 {
            return Err(ApiError::NotFound(text));
        }

        Err(ApiError::RequestError {
            status,
            message: text,
        })
    }
}

fn normalize_host(host: &str) -> Result<String, ApiError> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(ApiError::InvalidUrl("host is empty".to_string()));
    }

    let base_url = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };

    url::Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", host, e)))?;
    Ok(base_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};
    use serde::Deserialize;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Thing {
        id: i64,
    }

    #[test]
    fn bare_host_gets_https_scheme() {
        assert_eq!(
            normalize_host("example.immuta.com/").unwrap(),
            "https://example.immuta.com"
        );
        assert_eq!(
            normalize_host("http://127.0.0.1:1234").unwrap(),
            "http://127.0.0.1:1234"
        );
        assert!(matches!(normalize_host("  "), Err(ApiError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn sends_default_headers() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/bim/group/7")
            .match_header("authorization", "Bearer test-key")
            .match_header("content-type", "application/json")
            .match_header("user-agent", DEFAULT_USER_AGENT)
            .with_body(r#"{"id":7}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let thing: Thing = client.get("/bim/group/7").await.unwrap();

        assert_eq!(thing, Thing { id: 7 });
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn maps_404_to_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/project/1")
            .with_status(404)
            .with_body("Project not found")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client.get::<Thing>("/project/1").await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.message(), "Project not found");
    }

    #[tokio::test]
    async fn maps_other_statuses_to_request_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v2/purpose")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client
            .post::<Thing, _>("/api/v2/purpose", &serde_json::json!({}))
            .await
            .unwrap_err();

        match err {
            ApiError::RequestError { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_body_decodes_as_null() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/tag/pii")
            .with_status(200)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let unit: Result<(), _> = client.delete("/tag/pii").await;
        tokio_test::assert_ok!(unit);

        let _mock = server
            .mock("PUT", "/bim/iam/bim/user/u/authorizations/k/v")
            .with_status(200)
            .create_async()
            .await;
        let optional: Option<Thing> = client
            .put_empty("/bim/iam/bim/user/u/authorizations/k/v")
            .await
            .unwrap();
        assert!(optional.is_none());
    }

    #[tokio::test]
    async fn invalid_json_is_a_parse_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/tag")
            .with_body("not json")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client.get::<Thing>("/tag").await.unwrap_err();
        assert!(matches!(err, ApiError::ParseError(_)));
    }

    #[tokio::test]
    async fn query_parameters_are_sent() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/v2/data/conn")
            .match_query(Matcher::UrlEncoded("dryRun".into(), "true".into()))
            .with_body("{}")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let _: serde_json::Value = client
            .delete_with_params("/api/v2/data/conn", &ApiQueryParams::new().add("dryRun", true))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn exists_follows_status() {
        let mut server = Server::new_async().await;
        let _found = server
            .mock("GET", "/bim/group/1")
            .with_body(r#"{"id":1}"#)
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/bim/group/2")
            .with_status(404)
            .create_async()
            .await;
        let _broken = server
            .mock("GET", "/bim/group/3")
            .with_status(503)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        assert!(assert_ok!(client.exists("/bim/group/1").await));
        assert!(!assert_ok!(client.exists("/bim/group/2").await));
        assert_err!(client.exists("/bim/group/3").await);
    }

    #[tokio::test]
    async fn patch_and_head_use_their_methods() {
        let mut server = Server::new_async().await;
        let patch = server
            .mock("PATCH", "/bim/group/1")
            .match_body(Matcher::Json(serde_json::json!({"name": "x"})))
            .with_body(r#"{"id":1}"#)
            .create_async()
            .await;
        let head = server
            .mock("HEAD", "/bim/group/1")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let _: Thing = client
            .patch("/bim/group/1", &serde_json::json!({"name": "x"}))
            .await
            .unwrap();
        client.head("/bim/group/1").await.unwrap();

        patch.assert_async().await;
        head.assert_async().await;
    }
}
