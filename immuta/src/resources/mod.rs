//! Resource implementations

pub mod bim;
pub mod data;
pub mod governance;
pub mod reconcile;

pub use bim::{AttributeResource, GroupResource, GroupUsersResource, UserResource};
pub use data::DataSourceResource;
pub use governance::{ProjectResource, PurposeResource, TagResource};

use crate::api::{ApiError, Client};
use crate::ImmutaProviderData;
use std::collections::HashMap;
use tfplug::error::TfplugError;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, ManagedResource, ResourceFactory,
};
use tfplug::types::Diagnostic;

/// Every resource the provider registers, keyed by type name
pub fn factories() -> HashMap<String, ResourceFactory> {
    let mut factories: HashMap<String, ResourceFactory> = HashMap::new();

    factories.insert(
        "immuta_bim_user".to_string(),
        Box::new(|| Box::new(UserResource::new()) as Box<dyn ManagedResource>),
    );
    factories.insert(
        "immuta_bim_group".to_string(),
        Box::new(|| Box::new(GroupResource::new()) as Box<dyn ManagedResource>),
    );
    factories.insert(
        "immuta_bim_group_users".to_string(),
        Box::new(|| Box::new(GroupUsersResource::new()) as Box<dyn ManagedResource>),
    );
    factories.insert(
        "immuta_bim_attribute".to_string(),
        Box::new(|| Box::new(AttributeResource::new()) as Box<dyn ManagedResource>),
    );
    factories.insert(
        "immuta_project".to_string(),
        Box::new(|| Box::new(ProjectResource::new()) as Box<dyn ManagedResource>),
    );
    factories.insert(
        "immuta_purpose".to_string(),
        Box::new(|| Box::new(PurposeResource::new()) as Box<dyn ManagedResource>),
    );
    factories.insert(
        "immuta_tag".to_string(),
        Box::new(|| Box::new(TagResource::new()) as Box<dyn ManagedResource>),
    );
    factories.insert(
        "immuta_data_source".to_string(),
        Box::new(|| Box::new(DataSourceResource::new()) as Box<dyn ManagedResource>),
    );

    factories
}

/// Downcasts the provider data into `slot`. Missing data is left for the
/// CRUD calls to report, since schema and validation run unconfigured.
pub(crate) fn configure_provider_data(
    request: ConfigureResourceRequest,
    slot: &mut Option<ImmutaProviderData>,
) -> ConfigureResourceResponse {
    let mut diagnostics = vec![];

    if let Some(data) = request.provider_data {
        if let Some(provider_data) = data.downcast_ref::<ImmutaProviderData>() {
            *slot = Some(provider_data.clone());
        } else {
            diagnostics.push(Diagnostic::error(
                "Invalid provider data",
                "Failed to cast provider data to ImmutaProviderData",
            ));
        }
    }

    ConfigureResourceResponse { diagnostics }
}

pub(crate) fn client(provider_data: &Option<ImmutaProviderData>) -> Result<&Client, Diagnostic> {
    match provider_data {
        Some(data) => Ok(&data.client),
        None => Err(Diagnostic::error(
            "Provider not configured",
            "Provider data was not properly configured",
        )),
    }
}

pub(crate) fn api_error(summary: impl Into<String>, error: &ApiError) -> Diagnostic {
    Diagnostic::error(summary, format!("API error: {}", error))
}

pub(crate) fn state_error(error: TfplugError) -> Diagnostic {
    Diagnostic::error("Failed to build resource state", error.to_string())
}

pub(crate) fn config_error(name: &str, error: TfplugError) -> Diagnostic {
    Diagnostic::error(
        format!("Invalid value for {}", name),
        error.to_string(),
    )
    .with_attribute(tfplug::types::AttributePath::new(name))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Arc;
    use tfplug::context::Context;
    use tfplug::resource::ResourceWithConfigure;
    use tfplug::types::{AttributePath, Dynamic, DynamicValue};

    pub async fn configured<R: ResourceWithConfigure>(mut resource: R, url: &str) -> R {
        let client = Client::new(url, "test-key").unwrap();
        let data = ImmutaProviderData::new(client);
        let response = resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(Arc::new(data)),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
        resource
    }

    pub fn object(fields: Vec<(&str, Dynamic)>) -> DynamicValue {
        let mut value = DynamicValue::object();
        for (name, field) in fields {
            value.set_value(&AttributePath::new(name), field).unwrap();
        }
        value
    }

    pub fn nested(fields: Vec<(&str, Dynamic)>) -> Dynamic {
        object(fields).value
    }

    pub fn attr(value: &DynamicValue, name: &str) -> Dynamic {
        value.get_or_null(&AttributePath::new(name))
    }
}
