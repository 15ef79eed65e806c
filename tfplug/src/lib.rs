//! tfplug - Terraform Plugin Framework for Rust
//!
//! A framework for building Terraform providers in Rust, implementing the
//! managed-resource subset of Terraform Plugin Protocol v6.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod provider;
pub mod resource;

// Helper modules
pub mod import;
pub mod plan_modifier;
pub mod validator;

// Framework implementation modules
pub mod grpc;
pub mod proto;
pub mod server;

// Re-exports for convenience
pub use context::Context;
pub use error::{Result, TfplugError};
pub use grpc::GrpcProviderServer;
pub use import::{import_state_passthrough_id, import_state_passthrough_number_id};
pub use provider::{Provider, ProviderMetadataRequest, ProviderMetadataResponse};
pub use resource::{
    ManagedResource, Resource, ResourceFactory, ResourceWithConfigure, ResourceWithImportState,
};
pub use schema::{AttributeBuilder, AttributeType, NestedType, Schema, SchemaBuilder};
pub use server::{init_logging, serve, serve_default, LogLevel, ServerConfig};
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

// Convenience macro for main function
#[macro_export]
macro_rules! serve_provider {
    ($provider:expr) => {
        #[tokio::main]
        async fn main() -> $crate::Result<()> {
            $crate::serve($provider, $crate::ServerConfig::default()).await
        }
    };
    ($provider:expr, $config:expr) => {
        #[tokio::main]
        async fn main() -> $crate::Result<()> {
            $crate::serve($provider, $config).await
        }
    };
}
