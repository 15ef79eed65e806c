//! BIM group resource implementation

use crate::api::bim::groups::{CreateGroupRequest, UpdateGroupRequest};
use crate::resources::reconcile::{
    json_string_map, update_map_if_changed, update_string_if_changed,
};
use crate::resources::{api_error, client, config_error, configure_provider_data, state_error};
use crate::ImmutaProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_number_id;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

#[derive(Default)]
pub struct GroupResource {
    provider_data: Option<ImmutaProviderData>,
}

impl GroupResource {
    pub fn new() -> Self {
        Self::default()
    }
}

struct GroupConfig {
    iamid: String,
    name: String,
    email: Option<String>,
    description: Option<String>,
}

impl GroupConfig {
    fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let optional = |name: &str| {
            value
                .get_optional_string(&AttributePath::new(name))
                .map_err(|e| config_error(name, e))
        };

        Ok(Self {
            iamid: value
                .get_string(&AttributePath::new("iamid"))
                .map_err(|e| config_error("iamid", e))?,
            name: value
                .get_string(&AttributePath::new("name"))
                .map_err(|e| config_error("name", e))?,
            email: optional("email")?,
            description: optional("description")?,
        })
    }
}

fn group_id(state: &DynamicValue) -> Option<i64> {
    state
        .get_number(&AttributePath::new("id"))
        .ok()
        .map(|id| id as i64)
}

#[async_trait]
impl Resource for GroupResource {
    fn type_name(&self) -> &str {
        "immuta_bim_group"
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
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a group in an Immuta identity manager")
            .attribute(
                AttributeBuilder::new("id", AttributeType::Number)
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("iamid", AttributeType::String)
                    .description("Identity manager the group belongs to, usually bim")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("email", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "authorizations",
                    AttributeType::map_of(AttributeType::String),
                )
                .description("Authorizations reported by Immuta for this group")
                .optional()
                .build(),
            )
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

        let config = match GroupConfig::from_value(&new_state) {
            Ok(config) => config,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                };
            }
        };

        let create_request = CreateGroupRequest {
            iamid: config.iamid,
            name: config.name,
            email: config.email,
            description: config.description,
        };

        match client.bim().groups().create(&create_request).await {
            Ok(group) => {
                if let Err(e) = new_state.set_number(&AttributePath::new("id"), group.id as f64) {
                    diagnostics.push(state_error(e));
                }
            }
            Err(e) => diagnostics.push(api_error("Failed to create group", &e)),
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

        let Some(id) = group_id(&request.current_state) else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: request.private,
            };
        };

        let group = match client.bim().groups().get(id).await {
            Ok(group) => group,
            Err(e) if e.is_not_found() => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                    private: request.private,
                };
            }
            Err(e) => {
                diagnostics.push(api_error("Failed to read group", &e));
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                };
            }
        };

        let iamid = request
            .current_state
            .get_optional_string(&AttributePath::new("iamid"))
            .ok()
            .flatten();
        if group.id != id || iamid.is_some_and(|iamid| iamid != group.iamid) {
            diagnostics.push(Diagnostic::error(
                "Group mismatch",
                format!(
                    "Immuta returned group {} in {} for group {}",
                    group.id, group.iamid, id
                ),
            ));
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics,
                private: request.private,
            };
        }

        let mut new_state = request.current_state.clone();
        let result = update_string_if_changed(&mut new_state, "iamid", Some(group.iamid.as_str()))
            .and_then(|_| update_string_if_changed(&mut new_state, "name", Some(group.name.as_str())))
            .and_then(|_| update_string_if_changed(&mut new_state, "email", group.email.as_deref()))
            .and_then(|_| {
                update_string_if_changed(&mut new_state, "description", group.description.as_deref())
            })
            .and_then(|_| {
                update_map_if_changed(
                    &mut new_state,
                    "authorizations",
                    json_string_map(group.authorizations.iter().flatten()),
                )
            });
        if let Err(e) = result {
            diagnostics.push(state_error(e));
        }

        ReadResourceResponse {
            new_state: Some(new_state),
            diagnostics,
            private: request.private,
        }
    }

    async fn update(
        &self,
        _ctx: Context,
        request: UpdateResourceRequest,
    ) -> UpdateResourceResponse {
        let mut diagnostics = vec![];

        let client = match client(&self.provider_data) {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics,
                };
            }
        };

        let (Some(id), Ok(config)) = (
            group_id(&request.prior_state),
            GroupConfig::from_value(&request.planned_state),
        ) else {
            diagnostics.push(Diagnostic::error(
                "Invalid group state",
                "The prior state has no group id or the plan is incomplete",
            ));
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics,
            };
        };

        let update_request = UpdateGroupRequest {
            name: config.name,
            email: config.email,
            description: config.description,
        };

        match client.bim().groups().update(id, &update_request).await {
            Ok(group) if group.id != id => {
                diagnostics.push(Diagnostic::error(
                    "Group mismatch",
                    format!("Updating group {} returned group {}", id, group.id),
                ));
                UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics,
                }
            }
            Ok(_) => {
                let mut new_state = request.planned_state;
                if let Err(e) = new_state.set_number(&AttributePath::new("id"), id as f64) {
                    diagnostics.push(state_error(e));
                }
                UpdateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(api_error("Failed to update group", &e));
                UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics,
                }
            }
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

        let Some(id) = group_id(&request.prior_state) else {
            return DeleteResourceResponse { diagnostics };
        };

        match client.bim().groups().delete(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => diagnostics.push(api_error("Failed to delete group", &e)),
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for GroupResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_provider_data(request, &mut self.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for GroupResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        import_state_passthrough_number_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}
