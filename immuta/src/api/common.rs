//! Common types and utilities for the Immuta API

use serde::{Deserialize, Serialize};

/// Paged search result returned by the list endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse<T> {
    #[serde(default = "Vec::new")]
    pub hits: Vec<T>,
    #[serde(default)]
    pub count: u32,
}

/// A tag or purpose reference embedded in other objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ApiQueryParams {
    params: Vec<(String, String)>,
}

impl ApiQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            String::new()
        } else {
            format!(
                "?{}",
                self.params
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&")
            )
        }
    }
}

/// Percent-encodes a user supplied path segment
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_params_are_encoded() {
        let params = ApiQueryParams::new()
            .add("searchText", "my project")
            .add("nameOnly", true)
            .add_optional("limit", None::<u32>)
            .add_optional("offset", Some(10));

        assert_eq!(
            params.to_query_string(),
            "?searchText=my%20project&nameOnly=true&offset=10"
        );
    }

    #[test]
    fn empty_params_render_nothing() {
        assert!(ApiQueryParams::new().is_empty());
        assert_eq!(ApiQueryParams::new().to_query_string(), "");
    }

    #[test]
    fn segments_escape_separators() {
        assert_eq!(segment("a/b c"), "a%2Fb%20c");
        assert_eq!(segment("plain"), "plain");
    }

    #[test]
    fn search_response_defaults_missing_fields() {
        let response: SearchResponse<NamedRef> = serde_json::from_str("{}").unwrap();
        assert!(response.hits.is_empty());
        assert_eq!(response.count, 0);
    }
}
