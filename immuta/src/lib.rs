//! Terraform provider for the Immuta data governance platform

pub mod api;
pub mod provider_data;
pub mod resources;

pub use provider_data::ImmutaProviderData;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, Provider, ProviderMetadataRequest,
    ProviderMetadataResponse, ProviderSchemaRequest, ProviderSchemaResponse,
};
use tfplug::resource::ResourceFactory;
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

pub const HOST_ENV: &str = "IMMUTA_HOST";
pub const API_KEY_ENV: &str = "IMMUTA_API_KEY";

pub struct ImmutaProvider {
    provider_data: Option<ImmutaProviderData>,
}

impl Default for ImmutaProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ImmutaProvider {
    pub fn new() -> Self {
        Self {
            provider_data: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider_data.is_some()
    }
}

/// Provider block value first, then the environment
fn setting(config: &DynamicValue, name: &str, env: &str) -> Option<String> {
    config
        .get_optional_string(&AttributePath::new(name))
        .ok()
        .flatten()
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var(env).ok().filter(|v| !v.is_empty()))
}

#[async_trait]
impl Provider for ImmutaProvider {
    fn type_name(&self) -> &str {
        "immuta"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: self.type_name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        let schema = SchemaBuilder::new()
            .description("Manages users, groups, projects and data sources in Immuta")
            .attribute(
                AttributeBuilder::new("host", AttributeType::String)
                    .description("Immuta host name or URL. Can also be set with IMMUTA_HOST")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("api_key", AttributeType::String)
                    .description("Immuta API key. Can also be set with IMMUTA_API_KEY")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let mut diagnostics = vec![];

        let host = setting(&request.config, "host", HOST_ENV);
        let api_key = setting(&request.config, "api_key", API_KEY_ENV);

        match (host, api_key) {
            (Some(host), Some(api_key)) => match api::Client::new(&host, &api_key) {
                Ok(client) => {
                    tracing::debug!(base_url = %client.base_url(), "configured Immuta client");
                    self.provider_data = Some(ImmutaProviderData::new(client));
                }
                Err(e) => {
                    diagnostics.push(Diagnostic::error(
                        "Failed to create API client",
                        e.to_string(),
                    ));
                }
            },
            (None, _) => {
                diagnostics.push(Diagnostic::error(
                    "host is required (set in provider config or IMMUTA_HOST env var)",
                    "No Immuta host was configured",
                ));
            }
            (_, None) => {
                diagnostics.push(Diagnostic::error(
                    "api_key is required (set in provider config or IMMUTA_API_KEY env var)",
                    "No Immuta API key was configured",
                ));
            }
        }

        ConfigureProviderResponse {
            diagnostics,
            provider_data: self
                .provider_data
                .clone()
                .map(|data| Arc::new(data) as Arc<dyn std::any::Any + Send + Sync>),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        resources::factories()
    }
}
