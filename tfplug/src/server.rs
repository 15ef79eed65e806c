//! Server module for running Terraform providers
//!
//! This module starts the provider's gRPC server with TLS and prints the
//! go-plugin handshake line Terraform reads from stdout. Logs go to stderr.

use crate::error::{Result, TfplugError};
use crate::grpc::GrpcProviderServer;
use crate::proto::ProviderServer;
use crate::provider::Provider;
use std::path::PathBuf;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level for the server
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses Terraform's `TF_LOG` values; `JSON` maps to trace
    pub fn from_tf_log(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TRACE" | "JSON" => Some(LogLevel::Trace),
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Server configuration for running a Terraform provider
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to TLS certificate file
    pub cert_path: PathBuf,
    /// Path to TLS key file
    pub key_path: PathBuf,
    /// Maximum message size in bytes
    pub max_message_size: usize,
    pub enable_logging: bool,
    /// Used when neither `RUST_LOG` nor `TF_LOG` is set
    pub log_level: LogLevel,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let cert_path = std::env::var("TF_PLUGIN_CERT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_cert_dir().join("localhost.pem"));
        let key_path = std::env::var("TF_PLUGIN_KEY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_cert_dir().join("localhost-key.pem"));

        Self {
            cert_path,
            key_path,
            max_message_size: 256 << 20, // 256MB
            enable_logging: true,
            log_level: LogLevel::Info,
        }
    }
}

/// `certs/` next to the running binary, or under the working directory
fn default_cert_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("certs")))
        .filter(|dir| dir.exists())
        .unwrap_or_else(|| PathBuf::from("./certs"))
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cert_path(mut self, path: PathBuf) -> Self {
        self.cert_path = path;
        self
    }

    pub fn with_key_path(mut self, path: PathBuf) -> Self {
        self.key_path = path;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn without_logging(mut self) -> Self {
        self.enable_logging = false;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}

/// Installs a stderr subscriber. Stdout is reserved for the handshake.
///
/// The filter comes from `RUST_LOG`, then `TF_LOG`, then `default_level`.
/// A subscriber installed earlier (e.g. by a test harness) is left in place.
pub fn init_logging(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("TF_LOG")
            .ok()
            .and_then(|v| LogLevel::from_tf_log(&v))
            .unwrap_or(default_level);
        EnvFilter::new(level.as_str())
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init();
}

/// Main entry point for running a provider
pub async fn serve<P: Provider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    if config.enable_logging {
        init_logging(config.log_level);
    }

    // Another component may already have installed a provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let grpc_server = GrpcProviderServer::new(provider);
    let provider_service = ProviderServer::new(grpc_server)
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    let cert = tokio::fs::read(&config.cert_path).await.map_err(|e| {
        TfplugError::TlsError(format!(
            "Failed to read certificate {}: {}",
            config.cert_path.display(),
            e
        ))
    })?;

    let key = tokio::fs::read(&config.key_path).await.map_err(|e| {
        TfplugError::TlsError(format!(
            "Failed to read key {}: {}",
            config.key_path.display(),
            e
        ))
    })?;

    let identity = Identity::from_pem(cert, key);
    let tls_config = ServerTlsConfig::new().identity(identity);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!(address = %actual_addr, "provider server listening");
    println!("1|6|tcp|{}|grpc", actual_addr);

    let server = Server::builder()
        .tls_config(tls_config)?
        .add_service(provider_service);

    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    server.serve_with_incoming(incoming).await?;

    Ok(())
}

/// Convenience function to run a provider with default configuration
pub async fn serve_default<P: Provider + 'static>(provider: P) -> Result<()> {
    serve(provider, ServerConfig::default()).await
}
