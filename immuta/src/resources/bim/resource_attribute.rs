//! BIM attribute (authorization) resource implementation

use crate::api::bim::attributes::AttributeTarget;
use crate::resources::{api_error, client, config_error, configure_provider_data, state_error};
use crate::ImmutaProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource,
    ReadResourceRequest, ReadResourceResponse, Resource, ResourceMetadataRequest,
    ResourceMetadataResponse, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

#[derive(Default)]
pub struct AttributeResource {
    provider_data: Option<ImmutaProviderData>,
}

impl AttributeResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Attribute {
    target: AttributeTarget,
    key: String,
    value: String,
}

impl Attribute {
    fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let string = |name: &str| {
            value
                .get_string(&AttributePath::new(name))
                .map_err(|e| config_error(name, e))
        };

        Ok(Self {
            target: AttributeTarget {
                iam_id: string("iam_id")?,
                model_type: string("model_type")?,
                model_id: string("model_id")?,
            },
            key: string("key")?,
            value: string("value")?,
        })
    }

    /// Parses `{iam_id}/{model_type}/{model_id}/{key}/{value}`; the value
    /// keeps any further slashes
    fn from_id(id: &str) -> Option<Self> {
        let mut parts = id.splitn(5, '/');
        let mut next = || parts.next().filter(|p| !p.is_empty()).map(str::to_string);

        Some(Self {
            target: AttributeTarget {
                iam_id: next()?,
                model_type: next()?,
                model_id: next()?,
            },
            key: next()?,
            value: next()?,
        })
    }

    fn id(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.target.iam_id, self.target.model_type, self.target.model_id, self.key, self.value
        )
    }

    fn write_to(&self, state: &mut DynamicValue) -> tfplug::Result<()> {
        state.set_string(&AttributePath::new("id"), self.id())?;
        state.set_string(&AttributePath::new("iam_id"), self.target.iam_id.clone())?;
        state.set_string(&AttributePath::new("model_type"), self.target.model_type.clone())?;
        state.set_string(&AttributePath::new("model_id"), self.target.model_id.clone())?;
        state.set_string(&AttributePath::new("key"), self.key.clone())?;
        state.set_string(&AttributePath::new("value"), self.value.clone())
    }
}

#[async_trait]
impl Resource for AttributeResource {
    fn type_name(&self) -> &str {
        "immuta_bim_attribute"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let key_attribute = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .required()
                .plan_modifier(RequiresReplaceIfChanged)
        };

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Assigns an attribute value to an Immuta user or group")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("iam_id/model_type/model_id/key/value")
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(key_attribute("iam_id", "Identity manager, usually bim").build())
            .attribute(
                key_attribute("model_type", "Either user or group")
                    .validator(StringOneOfValidator::new(["user", "group"]))
                    .build(),
            )
            .attribute(key_attribute("model_id", "User id or group id").build())
            .attribute(key_attribute("key", "Attribute name").build())
            .attribute(key_attribute("value", "Attribute value").build())
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn create(
        &self,
        _ctx: Context,
        request: CreateResourceRequest,
    ) -> CreateResourceResponse {
        let mut diagnostics = vec![];
        let mut new_state = request.planned_state;

        let client = match client(&self.provider_data) {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                };
            }
        };

        let attribute = match Attribute::from_value(&new_state) {
            Ok(attribute) => attribute,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                };
            }
        };

        match client
            .bim()
            .attributes()
            .add(&attribute.target, &attribute.key, &attribute.value)
            .await
        {
            Ok(()) => {
                if let Err(e) = attribute.write_to(&mut new_state) {
                    diagnostics.push(state_error(e));
                }
            }
            Err(e) => diagnostics.push(api_error("Failed to add attribute", &e)),
        }

        CreateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let client = match client(&self.provider_data) {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                };
            }
        };

        let Ok(attribute) = Attribute::from_value(&request.current_state) else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: request.private,
            };
        };

        match client.bim().attributes().get(&attribute.target).await {
            Ok(authorizations) if authorizations.contains(&attribute.key, &attribute.value) => {
                ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                }
            }
            Ok(_) => {
                tracing::debug!(id = %attribute.id(), "attribute no longer assigned");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                    private: request.private,
                }
            }
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: request.private,
            },
            Err(e) => {
                diagnostics.push(api_error("Failed to read attributes", &e));
                ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                }
            }
        }
    }

    async fn update(
        &self,
        _ctx: Context,
        request: UpdateResourceRequest,
    ) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.prior_state,
            private: vec![],
            diagnostics: vec![Diagnostic::error(
                "Update not supported",
                "Attributes are replaced, never updated in place",
            )],
        }
    }

    async fn delete(
        &self,
        _ctx: Context,
        request: DeleteResourceRequest,
    ) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let client = match client(&self.provider_data) {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        let Ok(attribute) = Attribute::from_value(&request.prior_state) else {
            return DeleteResourceResponse { diagnostics };
        };

        match client
            .bim()
            .attributes()
            .remove(&attribute.target, &attribute.key, &attribute.value)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => diagnostics.push(api_error("Failed to remove attribute", &e)),
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for AttributeResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_provider_data(request, &mut self.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for AttributeResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };

        let Some(attribute) = Attribute::from_id(&request.id) else {
            response.diagnostics.push(Diagnostic::error(
                "Invalid import ID",
                format!(
                    "Expected iam_id/model_type/model_id/key/value, got '{}'",
                    request.id
                ),
            ));
            return response;
        };

        let mut state = DynamicValue::object();
        match attribute.write_to(&mut state) {
            Ok(()) => response.imported_resources.push(ImportedResource {
                type_name: request.type_name,
                state,
                private: vec![],
            }),
            Err(e) => response.diagnostics.push(state_error(e)),
        }

        response
    }
}
