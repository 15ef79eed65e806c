//! Tag resource implementation

use crate::api::tags::CreateTagRequest;
use crate::resources::reconcile::update_string_if_changed;
use crate::resources::{api_error, client, config_error, configure_provider_data, state_error};
use crate::ImmutaProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
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
use tfplug::types::{AttributePath, Diagnostic};

#[derive(Default)]
pub struct TagResource {
    provider_data: Option<ImmutaProviderData>,
}

impl TagResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for TagResource {
    fn type_name(&self) -> &str {
        "immuta_tag"
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
            .description("Manages an Immuta tag")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplace)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("root_tag", AttributeType::String)
                    .description("Name of the parent tag")
                    .optional()
                    .plan_modifier(RequiresReplace)
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

        let names = new_state
            .get_string(&AttributePath::new("name"))
            .map_err(|e| config_error("name", e))
            .and_then(|name| {
                new_state
                    .get_optional_string(&AttributePath::new("root_tag"))
                    .map(|root| (name, root))
                    .map_err(|e| config_error("root_tag", e))
            });
        let (name, root_tag) = match names {
            Ok(names) => names,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                };
            }
        };

        let request = CreateTagRequest::single(&name, root_tag.as_deref());
        match client.tags().create(&request).await {
            Ok(tags) => match tags.first() {
                Some(tag) => {
                    if let Err(e) = new_state.set_string(&AttributePath::new("id"), tag.id.to_string())
                    {
                        diagnostics.push(state_error(e));
                    }
                }
                None => diagnostics.push(Diagnostic::error(
                    "Failed to create tag",
                    format!("Creating tag '{}' returned no tags", name),
                )),
            },
            Err(e) => diagnostics.push(api_error("Failed to create tag", &e)),
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

        let Ok(name) = request.current_state.get_string(&AttributePath::new("name")) else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: request.private,
            };
        };

        match client.tags().find(&name).await {
            Ok(Some(tag)) if !tag.deleted => {
                let mut new_state = request.current_state.clone();
                let id = tag.id.to_string();
                if let Err(e) = update_string_if_changed(&mut new_state, "id", Some(id.as_str())) {
                    diagnostics.push(state_error(e));
                }
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics,
                    private: request.private,
                }
            }
            Ok(_) => ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: request.private,
            },
            Err(e) => {
                diagnostics.push(api_error("Failed to read tag", &e));
                ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                }
            }
        }
    }

    /// Every input forces replacement, so there is nothing to send
    async fn update(
        &self,
        _ctx: Context,
        request: UpdateResourceRequest,
    ) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            private: vec![],
            diagnostics: vec![],
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

        let Ok(name) = request.prior_state.get_string(&AttributePath::new("name")) else {
            return DeleteResourceResponse { diagnostics };
        };

        match client.tags().delete(&name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => diagnostics.push(api_error("Failed to delete tag", &e)),
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for TagResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_provider_data(request, &mut self.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for TagResource {
    /// Tags are imported by name; the read that follows fills in the id
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        import_state_passthrough_id(&ctx, AttributePath::new("name"), &request, &mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::{attr, configured, object};
    use mockito::{Matcher, Server};
    use serde_json::json;
    use tfplug::types::{Dynamic, DynamicValue};

    fn tag(id: Dynamic, root_tag: Dynamic) -> DynamicValue {
        object(vec![
            ("id", id),
            ("name", Dynamic::from("ssn")),
            ("root_tag", root_tag),
        ])
    }

    fn read_request(state: DynamicValue) -> ReadResourceRequest {
        ReadResourceRequest {
            type_name: "immuta_tag".to_string(),
            current_state: state,
            private: vec![],
            provider_meta: None,
            client_capabilities: Default::default(),
        }
    }

    fn create_request(state: DynamicValue) -> CreateResourceRequest {
        CreateResourceRequest {
            type_name: "immuta_tag".to_string(),
            config: state.clone(),
            planned_state: state,
            planned_private: vec![],
            provider_meta: None,
        }
    }

    #[tokio::test]
    async fn create_sends_root_tag() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/tag")
            .match_body(Matcher::Json(json!({
                "tags": [{"name": "ssn"}],
                "rootTag": {"name": "pii", "deleteHierarchy": false}
            })))
            .with_body(r#"[{"id":42,"name":"pii.ssn"}]"#)
            .create_async()
            .await;

        let resource = configured(TagResource::new(), &server.url()).await;
        let response = resource
            .create(Context::new(), create_request(tag(Dynamic::Unknown, Dynamic::from("pii"))))
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(attr(&response.new_state, "id"), Dynamic::from("42"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_with_empty_response_fails() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/tag")
            .with_body("[]")
            .create_async()
            .await;

        let resource = configured(TagResource::new(), &server.url()).await;
        let response = resource
            .create(Context::new(), create_request(tag(Dynamic::Unknown, Dynamic::Null)))
            .await;

        assert_eq!(response.diagnostics[0].summary, "Failed to create tag");
    }

    #[tokio::test]
    async fn read_matches_exact_name() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/tag")
            .match_query(Matcher::UrlEncoded("searchText".into(), "ssn".into()))
            .with_body(r#"[{"id":41,"name":"ssn_last4"},{"id":42,"name":"ssn"}]"#)
            .create_async()
            .await;

        let resource = configured(TagResource::new(), &server.url()).await;
        let response = resource
            .read(Context::new(), read_request(tag(Dynamic::Null, Dynamic::Null)))
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(attr(&response.new_state.unwrap(), "id"), Dynamic::from("42"));
    }

    #[tokio::test]
    async fn read_without_match_removes_state() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/tag")
            .match_query(Matcher::Any)
            .with_body(r#"[{"id":41,"name":"ssn_last4"}]"#)
            .create_async()
            .await;

        let resource = configured(TagResource::new(), &server.url()).await;
        let response = resource
            .read(Context::new(), read_request(tag(Dynamic::from("42"), Dynamic::Null)))
            .await;

        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn import_sets_name() {
        let resource = TagResource::new();
        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "immuta_tag".to_string(),
                    id: "ssn".to_string(),
                    client_capabilities: Default::default(),
                },
            )
            .await;

        let state = &response.imported_resources[0].state;
        assert_eq!(attr(state, "name"), Dynamic::from("ssn"));
    }

    #[tokio::test]
    async fn delete_uses_name() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/tag/ssn")
            .with_status(404)
            .create_async()
            .await;

        let resource = configured(TagResource::new(), &server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "immuta_tag".to_string(),
                    prior_state: tag(Dynamic::from("42"), Dynamic::Null),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        mock.assert_async().await;
    }
}
