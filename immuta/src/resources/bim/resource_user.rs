//! BIM user resource implementation

use crate::api::bim::users::{CreateUserRequest, ExternalUserIds, UserProfile, UserProfileInput};
use crate::resources::{api_error, client, config_error, configure_provider_data, state_error};
use crate::resources::reconcile::{set_optional_string, update_string_if_changed};
use crate::ImmutaProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
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
use tfplug::validator::StringPatternValidator;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

#[derive(Default)]
pub struct UserResource {
    provider_data: Option<ImmutaProviderData>,
}

impl UserResource {
    pub fn new() -> Self {
        Self::default()
    }
}

struct UserConfig {
    userid: String,
    password: String,
    name: Option<String>,
    email: Option<String>,
    snowflake_user: Option<String>,
}

impl UserConfig {
    fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let string = |name: &str| {
            value
                .get_string(&AttributePath::new(name))
                .map_err(|e| config_error(name, e))
        };
        let optional = |name: &str| {
            value
                .get_optional_string(&AttributePath::new(name))
                .map_err(|e| config_error(name, e))
        };

        Ok(Self {
            userid: string("userid")?,
            password: string("password")?,
            name: optional("name")?,
            email: optional("email")?,
            snowflake_user: optional("snowflake_user")?,
        })
    }

    /// Immuta requires a display name; the user id stands in for it
    fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.userid.clone())
    }

    fn profile(&self) -> UserProfile {
        UserProfile {
            name: Some(self.display_name()),
            email: self.email.clone(),
            // an empty mapping clears a previously set Snowflake user
            external_user_ids: Some(ExternalUserIds {
                snowflake_user: Some(self.snowflake_user.clone().unwrap_or_default()),
            }),
        }
    }
}

#[async_trait]
impl Resource for UserResource {
    fn type_name(&self) -> &str {
        "immuta_bim_user"
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
            .description("Manages a user in the built-in Immuta identity manager")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Same as userid")
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("userid", AttributeType::String)
                    .description("Login name of the user")
                    .required()
                    .plan_modifier(RequiresReplaceIfChanged)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("password", AttributeType::String)
                    .description("Initial password")
                    .required()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Display name, defaults to userid")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("email", AttributeType::String)
                    .description("Email address")
                    .optional()
                    .validator(StringPatternValidator::new(EMAIL_PATTERN, "an email address"))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("snowflake_user", AttributeType::String)
                    .description("Snowflake user name mapped to this user")
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

        let config = match UserConfig::from_value(&new_state) {
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

        let create_request = CreateUserRequest {
            userid: config.userid.clone(),
            password: config.password.clone(),
            profile: UserProfileInput {
                name: Some(config.display_name()),
                email: config.email.clone(),
            },
        };

        let created = match client.bim().users().create(&create_request).await {
            Ok(response) => response.new_user.filter(|user| !user.userid.is_empty()),
            Err(e) => {
                diagnostics.push(api_error("Failed to create user", &e));
                return CreateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                };
            }
        };

        let Some(user) = created else {
            diagnostics.push(Diagnostic::error(
                "No user id in response",
                format!("Creating user '{}' returned no user", config.userid),
            ));
            return CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics,
            };
        };

        let name = user.profile.name.clone().unwrap_or_else(|| config.display_name());
        let result = new_state
            .set_string(&AttributePath::new("id"), user.userid.clone())
            .and_then(|_| new_state.set_string(&AttributePath::new("name"), name));
        if let Err(e) = result {
            diagnostics.push(state_error(e));
        }

        if config.snowflake_user.is_some() {
            if let Err(e) = client
                .bim()
                .users()
                .update_profile(&user.userid, &config.profile())
                .await
            {
                diagnostics.push(api_error("Failed to set the Snowflake user", &e));
            }
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

        let Ok(userid) = request.current_state.get_string(&AttributePath::new("id")) else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: request.private,
            };
        };

        match client.bim().users().get(&userid).await {
            Ok(user) => {
                let mut new_state = request.current_state.clone();
                let result = new_state
                    .set_string(&AttributePath::new("userid"), user.userid.clone())
                    .and_then(|_| {
                        update_string_if_changed(&mut new_state, "name", user.profile.name.as_deref())
                    })
                    .and_then(|_| {
                        update_string_if_changed(&mut new_state, "email", user.profile.email.as_deref())
                    })
                    .and_then(|_| {
                        update_string_if_changed(
                            &mut new_state,
                            "snowflake_user",
                            user.profile.snowflake_user(),
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
            Err(e) if e.is_not_found() => {
                tracing::debug!(userid = %userid, "user no longer exists");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                    private: request.private,
                }
            }
            Err(e) => {
                diagnostics.push(api_error("Failed to read user", &e));
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

        let config = match UserConfig::from_value(&request.planned_state) {
            Ok(config) => config,
            Err(diag) => {
                diagnostics.push(diag);
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics,
                };
            }
        };

        let userid = request
            .prior_state
            .get_string(&AttributePath::new("id"))
            .unwrap_or_else(|_| config.userid.clone());

        match client
            .bim()
            .users()
            .update_profile(&userid, &config.profile())
            .await
        {
            Ok(user) => {
                let mut new_state = request.planned_state;
                let id = if user.userid.is_empty() {
                    userid
                } else {
                    user.userid
                };
                let result = new_state
                    .set_string(&AttributePath::new("id"), id)
                    .and_then(|_| {
                        set_optional_string(&mut new_state, "name", Some(config.display_name()))
                    });
                if let Err(e) = result {
                    diagnostics.push(state_error(e));
                }

                UpdateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(api_error("Failed to update user", &e));
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

        let Ok(userid) = request.prior_state.get_string(&AttributePath::new("id")) else {
            return DeleteResourceResponse { diagnostics };
        };

        match client.bim().users().delete(&userid).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => diagnostics.push(api_error("Failed to delete user", &e)),
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for UserResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_provider_data(request, &mut self.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for UserResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}
