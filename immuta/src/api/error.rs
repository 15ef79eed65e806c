use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("API returned error (HTTP {status}): {message}")]
    RequestError { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// Response body of a failed request, empty for other errors
    pub fn message(&self) -> &str {
        match self {
            ApiError::NotFound(message) | ApiError::RequestError { message, .. } => message,
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_status_and_body() {
        let error = ApiError::RequestError {
            status: 400,
            message: "Bad Request".to_string(),
        };

        let text = error.to_string();
        assert!(text.contains("HTTP 400"));
        assert!(text.contains("Bad Request"));
        assert!(!error.is_not_found());
        assert_eq!(error.message(), "Bad Request");
    }

    #[test]
    fn not_found_is_detected() {
        assert!(ApiError::NotFound("gone".to_string()).is_not_found());
        assert!(!ApiError::ParseError("bad json".to_string()).is_not_found());
    }
}
