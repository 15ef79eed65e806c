//! Project resource implementation

use crate::api::projects::ProjectInput;
use crate::api::Client;
use crate::resources::reconcile::{
    json_string_map, update_if_changed, update_list_if_changed, update_map_if_changed,
    update_string_if_changed,
};
use crate::resources::{api_error, client, config_error, configure_provider_data, state_error};
use crate::ImmutaProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
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
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

#[derive(Default)]
pub struct ProjectResource {
    provider_data: Option<ImmutaProviderData>,
}

impl ProjectResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the upsert body from the plan, defaulting the documentation
    fn project_input(value: &DynamicValue) -> Result<ProjectInput, Diagnostic> {
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
        let strings = |name: &str| -> Result<Vec<String>, Diagnostic> {
            Ok(value
                .get_optional_list(&AttributePath::new(name))
                .map_err(|e| config_error(name, e))?
                .unwrap_or_default()
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect())
        };

        let name = string("name")?;
        let documentation = optional("documentation")?
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("# {}", name));

        let subscription_policy = value
            .get_optional_map(&AttributePath::new("subscription_policy"))
            .map_err(|e| config_error("subscription_policy", e))?
            .map(|policy| {
                policy
                    .into_iter()
                    .filter_map(|(key, v)| {
                        v.as_str()
                            .map(|s| (key, serde_json::Value::String(s.to_string())))
                    })
                    .collect::<HashMap<_, _>>()
            });

        Ok(ProjectInput {
            name,
            project_key: string("project_key")?,
            description: optional("description")?,
            documentation: Some(documentation),
            allow_masked_joins: value
                .get_optional_bool(&AttributePath::new("allow_masked_joins"))
                .map_err(|e| config_error("allow_masked_joins", e))?
                .unwrap_or(false),
            subscription_policy,
            tags: strings("tags")?,
            purposes: strings("purposes")?,
        })
    }

    /// Upserts, then acknowledges the owner's subscription. Returns the
    /// project id.
    async fn save(client: &Client, input: &ProjectInput) -> Result<i64, Diagnostic> {
        let response = client
            .projects()
            .upsert_acknowledging(input)
            .await
            .map_err(|e| api_error("Failed to save project", &e))?;

        let project = client
            .projects()
            .get(response.project_id)
            .await
            .map_err(|e| api_error("Failed to read project", &e))?;

        client
            .projects()
            .acknowledge(project.id, project.subscription_id)
            .await
            .map_err(|e| api_error("Failed to acknowledge project", &e))?;

        Ok(response.project_id)
    }
}

fn project_id(state: &DynamicValue) -> Option<i64> {
    state
        .get_string(&AttributePath::new("id"))
        .ok()
        .and_then(|id| id.parse().ok())
}

#[async_trait]
impl Resource for ProjectResource {
    fn type_name(&self) -> &str {
        "immuta_project"
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
            .description("Manages an Immuta project")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("project_key", AttributeType::String)
                    .description("Unique key of the project")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("documentation", AttributeType::String)
                    .description("Markdown documentation, defaults to a heading with the name")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("allow_masked_joins", AttributeType::Bool)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "subscription_policy",
                    AttributeType::map_of(AttributeType::String),
                )
                .description("The subscription policy of the project")
                .optional()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::list_of(AttributeType::String))
                    .description("Names of tags applied to the project")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("purposes", AttributeType::list_of(AttributeType::String))
                    .description("Names of purposes of the project")
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

        let input = match Self::project_input(&new_state) {
            Ok(input) => input,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                };
            }
        };

        match Self::save(client, &input).await {
            Ok(id) => {
                let result = new_state
                    .set_string(&AttributePath::new("id"), id.to_string())
                    .and_then(|_| {
                        new_state.set_string(
                            &AttributePath::new("documentation"),
                            input.documentation.clone().unwrap_or_default(),
                        )
                    });
                if let Err(e) = result {
                    diagnostics.push(state_error(e));
                }
            }
            Err(diag) => diagnostics.push(diag),
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

        let Some(id) = project_id(&request.current_state) else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: request.private,
            };
        };

        let project = match client.projects().get(id).await {
            Ok(project) if !project.deleted => project,
            Ok(_) => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                    private: request.private,
                }
            }
            Err(e) if e.is_not_found() => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                    private: request.private,
                }
            }
            Err(e) => {
                diagnostics.push(api_error("Failed to read project", &e));
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                };
            }
        };

        let mut new_state = request.current_state.clone();
        let masked_joins = if project.allow_masked_joins {
            Dynamic::Bool(true)
        } else {
            match new_state.get_or_null(&AttributePath::new("allow_masked_joins")) {
                Dynamic::Null => Dynamic::Null,
                _ => Dynamic::Bool(false),
            }
        };

        let result = update_string_if_changed(&mut new_state, "name", Some(project.name.as_str()))
            .and_then(|_| {
                update_string_if_changed(&mut new_state, "project_key", Some(project.project_key.as_str()))
            })
            .and_then(|_| {
                update_string_if_changed(&mut new_state, "description", project.description.as_deref())
            })
            .and_then(|_| {
                update_string_if_changed(
                    &mut new_state,
                    "documentation",
                    project.documentation.as_deref(),
                )
            })
            .and_then(|_| update_if_changed(&mut new_state, "allow_masked_joins", masked_joins))
            .and_then(|_| {
                update_map_if_changed(
                    &mut new_state,
                    "subscription_policy",
                    json_string_map(project.subscription_policy.iter().flatten()),
                )
            })
            .and_then(|_| {
                update_list_if_changed(
                    &mut new_state,
                    "tags",
                    project.tags.iter().map(|t| t.name.clone()),
                )
            })
            .and_then(|_| {
                update_list_if_changed(
                    &mut new_state,
                    "purposes",
                    project.purposes.iter().map(|p| p.name.clone()),
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

        let input = match Self::project_input(&request.planned_state) {
            Ok(input) => input,
            Err(diag) => {
                diagnostics.push(diag);
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics,
                };
            }
        };

        let prior_id = project_id(&request.prior_state);
        match Self::save(client, &input).await {
            Ok(id) if prior_id.is_some_and(|prior| prior != id) => {
                diagnostics.push(Diagnostic::error(
                    "Project mismatch",
                    format!(
                        "Saving project '{}' returned project {} instead of {}",
                        input.project_key,
                        id,
                        prior_id.unwrap_or_default()
                    ),
                ));
                UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics,
                }
            }
            Ok(id) => {
                let mut new_state = request.planned_state;
                let result = new_state
                    .set_string(&AttributePath::new("id"), id.to_string())
                    .and_then(|_| {
                        new_state.set_string(
                            &AttributePath::new("documentation"),
                            input.documentation.clone().unwrap_or_default(),
                        )
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
            Err(diag) => {
                diagnostics.push(diag);
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

        let Ok(project_key) = request
            .prior_state
            .get_string(&AttributePath::new("project_key"))
        else {
            return DeleteResourceResponse { diagnostics };
        };

        match client.projects().delete(&project_key).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => diagnostics.push(api_error("Failed to delete project", &e)),
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for ProjectResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_provider_data(request, &mut self.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for ProjectResource {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::{attr, configured, object};
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn planned() -> DynamicValue {
        object(vec![
            ("id", Dynamic::Unknown),
            ("name", Dynamic::from("Fraud")),
            ("project_key", Dynamic::from("fraud")),
            ("description", Dynamic::Null),
            ("documentation", Dynamic::Unknown),
            ("allow_masked_joins", Dynamic::Null),
            ("subscription_policy", Dynamic::Null),
            ("tags", Dynamic::string_list(["pii"])),
            ("purposes", Dynamic::Null),
        ])
    }

    fn stored() -> DynamicValue {
        let mut state = planned();
        state
            .set_string(&AttributePath::new("id"), "3".to_string())
            .unwrap();
        state
            .set_string(&AttributePath::new("documentation"), "# Fraud".to_string())
            .unwrap();
        state
    }

    async fn project_and_ack(server: &mut mockito::ServerGuard) -> (mockito::Mock, mockito::Mock) {
        let get = server
            .mock("GET", "/project/3")
            .with_body(r#"{"id":3,"name":"Fraud","projectKey":"fraud","subscriptionId":17}"#)
            .create_async()
            .await;
        let ack = server
            .mock("POST", "/project/3/members/17/acknowledge")
            .create_async()
            .await;
        (get, ack)
    }

    #[test]
    fn input_defaults_documentation_to_name_heading() {
        let input = ProjectResource::project_input(&planned()).unwrap();
        assert_eq!(input.documentation.as_deref(), Some("# Fraud"));
        assert_eq!(input.tags, vec!["pii".to_string()]);
        assert!(input.subscription_policy.is_none());
    }

    #[tokio::test]
    async fn create_upserts_then_acknowledges() {
        let mut server = Server::new_async().await;
        let upsert = server
            .mock("POST", "/api/v2/project")
            .match_body(Matcher::PartialJson(json!({
                "name": "Fraud",
                "projectKey": "fraud",
                "documentation": "# Fraud",
                "tags": ["pii"]
            })))
            .with_body(r#"{"projectId":3,"creating":true}"#)
            .create_async()
            .await;
        let (_get, ack) = project_and_ack(&mut server).await;

        let resource = configured(ProjectResource::new(), &server.url()).await;
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "immuta_project".to_string(),
                    config: planned(),
                    planned_state: planned(),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.new_state, stored());
        upsert.assert_async().await;
        ack.assert_async().await;
    }

    #[tokio::test]
    async fn read_keeps_unset_collections_and_copies_changes() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/project/3")
            .with_body(
                r##"{"id":3,"name":"Fraud","projectKey":"fraud","documentation":"# Fraud",
                    "description":"Fraud detection","allowMaskedJoins":false,
                    "tags":[{"id":1,"name":"pii"}],"purposes":[],"subscriptionId":17}"##,
            )
            .create_async()
            .await;

        let resource = configured(ProjectResource::new(), &server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "immuta_project".to_string(),
                    current_state: stored(),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        let state = response.new_state.unwrap();
        assert_eq!(attr(&state, "description"), Dynamic::from("Fraud detection"));
        assert_eq!(attr(&state, "purposes"), Dynamic::Null);
        assert_eq!(attr(&state, "allow_masked_joins"), Dynamic::Null);
        assert_eq!(attr(&state, "tags"), Dynamic::string_list(["pii"]));
    }

    #[tokio::test]
    async fn update_rejects_a_different_project_id() {
        let mut server = Server::new_async().await;
        let _upsert = server
            .mock("POST", "/api/v2/project")
            .with_body(r#"{"projectId":4,"updating":true}"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/project/4")
            .with_body(r#"{"id":4,"subscriptionId":18}"#)
            .create_async()
            .await;
        let _ack = server
            .mock("POST", "/project/4/members/18/acknowledge")
            .create_async()
            .await;

        let resource = configured(ProjectResource::new(), &server.url()).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "immuta_project".to_string(),
                    prior_state: stored(),
                    config: stored(),
                    planned_state: stored(),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert_eq!(response.diagnostics[0].summary, "Project mismatch");
        assert_eq!(response.new_state, stored());
    }

    #[tokio::test]
    async fn rename_recomputes_default_documentation() {
        let mut server = Server::new_async().await;
        let upsert = server
            .mock("POST", "/api/v2/project")
            .match_body(Matcher::PartialJson(json!({
                "name": "Fraud Ops",
                "documentation": "# Fraud Ops"
            })))
            .with_body(r#"{"projectId":3,"updating":true}"#)
            .create_async()
            .await;
        let (_get, _ack) = project_and_ack(&mut server).await;

        let mut renamed = stored();
        renamed
            .set_string(&AttributePath::new("name"), "Fraud Ops".to_string())
            .unwrap();
        renamed
            .set_value(&AttributePath::new("documentation"), Dynamic::Unknown)
            .unwrap();

        let resource = configured(ProjectResource::new(), &server.url()).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "immuta_project".to_string(),
                    prior_state: stored(),
                    config: renamed.clone(),
                    planned_state: renamed,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(
            attr(&response.new_state, "documentation"),
            Dynamic::from("# Fraud Ops")
        );
        upsert.assert_async().await;
    }

    #[tokio::test]
    async fn documentation_is_replanned_on_change() {
        let response = ProjectResource::new()
            .schema(Context::new(), ResourceSchemaRequest)
            .await;
        let documentation = response.schema.block.attribute("documentation").unwrap();
        assert!(documentation.plan_modifiers.is_empty());
    }

    #[tokio::test]
    async fn delete_uses_project_key() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/v2/project/fraud")
            .create_async()
            .await;

        let resource = configured(ProjectResource::new(), &server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "immuta_project".to_string(),
                    prior_state: stored(),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        mock.assert_async().await;
    }
}
