//! Error types for tfplug

/// Error type for tfplug operations
#[derive(Debug, thiserror::Error)]
pub enum TfplugError {
    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Attribute not found: {0}")]
    AttributeNotFound(String),

    #[error("Invalid attribute path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TLS configuration error: {0}")]
    TlsError(String),

    #[error("Transport error: {0}")]
    TransportError(#[from] tonic::transport::Error),
}

/// Result type alias for tfplug operations
pub type Result<T> = std::result::Result<T, TfplugError>;

impl TfplugError {
    /// True when a path lookup failed because the attribute is absent
    pub fn is_missing_attribute(&self) -> bool {
        matches!(self, TfplugError::AttributeNotFound(_))
    }
}
