//! Purpose resource implementation

use crate::api::purposes::{Purpose, PurposeInput};
use crate::resources::reconcile::{update_if_changed, update_string_if_changed};
use crate::resources::{api_error, client, config_error, configure_provider_data, state_error};
use crate::ImmutaProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

/// The server only records the acknowledgement text on the second upsert
/// of a new purpose
const CREATE_UPSERTS: usize = 2;

#[derive(Default)]
pub struct PurposeResource {
    provider_data: Option<ImmutaProviderData>,
}

impl PurposeResource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn purpose_input(value: &DynamicValue) -> Result<PurposeInput, Diagnostic> {
    let optional = |name: &str| {
        value
            .get_optional_string(&AttributePath::new(name))
            .map(Option::unwrap_or_default)
            .map_err(|e| config_error(name, e))
    };

    let subpurposes = value
        .get_optional_list(&AttributePath::new("subpurposes"))
        .map_err(|e| config_error("subpurposes", e))?
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(index, item)| subpurpose(item, index))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PurposeInput {
        purpose: Purpose {
            name: value
                .get_string(&AttributePath::new("name"))
                .map_err(|e| config_error("name", e))?,
            description: optional("description")?,
            acknowledgement: optional("acknowledgement")?,
        },
        subpurposes,
    })
}

fn subpurpose(item: &Dynamic, index: usize) -> Result<Purpose, Diagnostic> {
    let fields = item.as_map();
    let field = |name: &str| {
        fields
            .and_then(|f| f.get(name))
            .and_then(Dynamic::as_str)
            .map(str::to_string)
    };

    let name = field("name").ok_or_else(|| {
        Diagnostic::error(
            "Invalid subpurpose",
            format!("subpurposes[{}].name is required", index),
        )
        .with_attribute(
            AttributePath::new("subpurposes")
                .index(index as i64)
                .attribute("name"),
        )
    })?;

    Ok(Purpose {
        name,
        description: field("description").unwrap_or_default(),
        acknowledgement: field("acknowledgement").unwrap_or_default(),
    })
}

/// State form of the subpurposes; empty strings are stored as null
fn subpurposes_value(subpurposes: &[Purpose]) -> Dynamic {
    let text = |s: &str| {
        if s.is_empty() {
            Dynamic::Null
        } else {
            Dynamic::String(s.to_string())
        }
    };

    Dynamic::List(
        subpurposes
            .iter()
            .map(|p| {
                Dynamic::Map(HashMap::from([
                    ("name".to_string(), Dynamic::String(p.name.clone())),
                    ("description".to_string(), text(&p.description)),
                    ("acknowledgement".to_string(), text(&p.acknowledgement)),
                ]))
            })
            .collect(),
    )
}

fn purpose_id(state: &DynamicValue) -> Option<i64> {
    state
        .get_number(&AttributePath::new("id"))
        .ok()
        .map(|id| id as i64)
}

#[async_trait]
impl Resource for PurposeResource {
    fn type_name(&self) -> &str {
        "immuta_purpose"
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
        let subpurpose = NestedType::list(vec![
            AttributeBuilder::new("name", AttributeType::String)
                .required()
                .build(),
            AttributeBuilder::new("description", AttributeType::String)
                .optional()
                .build(),
            AttributeBuilder::new("acknowledgement", AttributeType::String)
                .optional()
                .build(),
        ]);

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages an Immuta purpose")
            .attribute(
                AttributeBuilder::new("id", AttributeType::Number)
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
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("acknowledgement", AttributeType::String)
                    .description("Statement users accept when joining a project with this purpose")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::nested("subpurposes", subpurpose)
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

        let input = match purpose_input(&new_state) {
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

        let mut purpose_id = None;
        for _ in 0..CREATE_UPSERTS {
            match client.purposes().upsert(&input).await {
                Ok(response) => purpose_id = Some(response.purpose_id),
                Err(e) => {
                    diagnostics.push(api_error("Failed to create purpose", &e));
                    return CreateResourceResponse {
                        new_state,
                        private: vec![],
                        diagnostics,
                    };
                }
            }
        }

        if let Some(id) = purpose_id {
            if let Err(e) = new_state.set_number(&AttributePath::new("id"), id as f64) {
                diagnostics.push(state_error(e));
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

        let Some(id) = purpose_id(&request.current_state) else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: request.private,
            };
        };

        let purpose = match client.purposes().get(id).await {
            Ok(purpose) if purpose.deleted => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                    private: request.private,
                }
            }
            Ok(purpose) => purpose,
            Err(e) if e.is_not_found() => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                    private: request.private,
                }
            }
            Err(e) => {
                diagnostics.push(api_error("Failed to read purpose", &e));
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                };
            }
        };

        if purpose.id != id {
            diagnostics.push(Diagnostic::error(
                "Purpose mismatch",
                format!("Requested purpose {} but the API returned {}", id, purpose.id),
            ));
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics,
                private: request.private,
            };
        }

        let mut new_state = request.current_state.clone();
        let result = update_string_if_changed(&mut new_state, "name", Some(purpose.purpose.name.as_str()))
            .and_then(|_| {
                update_string_if_changed(
                    &mut new_state,
                    "description",
                    Some(purpose.purpose.description.as_str()),
                )
            })
            .and_then(|_| {
                update_string_if_changed(
                    &mut new_state,
                    "acknowledgement",
                    Some(purpose.purpose.acknowledgement.as_str()),
                )
            })
            .and_then(|_| {
                update_if_changed(
                    &mut new_state,
                    "subpurposes",
                    subpurposes_value(&purpose.subpurposes),
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

        let input = match purpose_input(&request.planned_state) {
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

        let prior_id = purpose_id(&request.prior_state);
        let response = match client.purposes().upsert(&input).await {
            Ok(response) => response,
            Err(e) => {
                diagnostics.push(api_error("Failed to update purpose", &e));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics,
                };
            }
        };

        if let Some(prior) = prior_id.filter(|prior| *prior != response.purpose_id) {
            diagnostics.push(Diagnostic::error(
                "Purpose mismatch",
                format!(
                    "Updating purpose {} changed purpose {} instead",
                    prior, response.purpose_id
                ),
            ));
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics,
            };
        }

        let mut new_state = request.planned_state;
        if let Err(e) = new_state.set_number(&AttributePath::new("id"), response.purpose_id as f64)
        {
            diagnostics.push(state_error(e));
        }

        UpdateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
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

        let Some(id) = purpose_id(&request.prior_state) else {
            return DeleteResourceResponse { diagnostics };
        };

        match client.purposes().delete(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => diagnostics.push(api_error("Failed to delete purpose", &e)),
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for PurposeResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_provider_data(request, &mut self.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for PurposeResource {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::{attr, configured, nested, object};
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn research(id: Dynamic, subpurposes: Dynamic) -> DynamicValue {
        object(vec![
            ("id", id),
            ("name", Dynamic::from("Research")),
            ("description", Dynamic::Null),
            ("acknowledgement", Dynamic::from("I agree")),
            ("subpurposes", subpurposes),
        ])
    }

    fn read_request(state: DynamicValue) -> ReadResourceRequest {
        ReadResourceRequest {
            type_name: "immuta_purpose".to_string(),
            current_state: state,
            private: vec![],
            provider_meta: None,
            client_capabilities: Default::default(),
        }
    }

    #[test]
    fn input_requires_subpurpose_names() {
        let value = research(
            Dynamic::Unknown,
            Dynamic::List(vec![nested(vec![("description", Dynamic::from("x"))])]),
        );
        let diag = purpose_input(&value).unwrap_err();
        assert_eq!(diag.summary, "Invalid subpurpose");
    }

    #[tokio::test]
    async fn create_upserts_exactly_twice() {
        let mut server = Server::new_async().await;
        let upsert = server
            .mock("POST", "/api/v2/purpose")
            .match_body(Matcher::Json(json!({
                "name": "Research",
                "description": "",
                "acknowledgement": "I agree"
            })))
            .with_body(r#"{"purposeId":12,"creating":true}"#)
            .expect(2)
            .create_async()
            .await;

        let resource = configured(PurposeResource::new(), &server.url()).await;
        let planned = research(Dynamic::Unknown, Dynamic::Null);
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "immuta_purpose".to_string(),
                    config: planned.clone(),
                    planned_state: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(attr(&response.new_state, "id"), Dynamic::Number(12.0));
        upsert.assert_async().await;
    }

    #[tokio::test]
    async fn read_replaces_changed_subpurposes() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/governance/purpose/12")
            .match_query(Matcher::UrlEncoded(
                "includeSubpurposes".into(),
                "true".into(),
            ))
            .with_body(
                r#"{"id":12,"name":"Research","acknowledgement":"I agree",
                    "subpurposes":[{"name":"Research.Clinical"}]}"#,
            )
            .create_async()
            .await;

        let resource = configured(PurposeResource::new(), &server.url()).await;
        let response = resource
            .read(
                Context::new(),
                read_request(research(Dynamic::Number(12.0), Dynamic::Null)),
            )
            .await;

        assert!(response.diagnostics.is_empty());
        let state = response.new_state.unwrap();
        assert_eq!(attr(&state, "description"), Dynamic::Null);
        assert_eq!(
            attr(&state, "subpurposes"),
            Dynamic::List(vec![nested(vec![
                ("name", Dynamic::from("Research.Clinical")),
                ("description", Dynamic::Null),
                ("acknowledgement", Dynamic::Null),
            ])])
        );
    }

    #[tokio::test]
    async fn read_rejects_a_different_purpose() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/governance/purpose/12")
            .match_query(Matcher::Any)
            .with_body(r#"{"id":13,"name":"Research"}"#)
            .create_async()
            .await;

        let resource = configured(PurposeResource::new(), &server.url()).await;
        let response = resource
            .read(
                Context::new(),
                read_request(research(Dynamic::Number(12.0), Dynamic::Null)),
            )
            .await;

        assert_eq!(response.diagnostics[0].summary, "Purpose mismatch");
    }

    #[tokio::test]
    async fn read_of_deleted_purpose_removes_state() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/governance/purpose/12")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let resource = configured(PurposeResource::new(), &server.url()).await;
        let response = resource
            .read(
                Context::new(),
                read_request(research(Dynamic::Number(12.0), Dynamic::Null)),
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn update_upserts_once() {
        let mut server = Server::new_async().await;
        let upsert = server
            .mock("POST", "/api/v2/purpose")
            .with_body(r#"{"purposeId":12,"updating":true}"#)
            .expect(1)
            .create_async()
            .await;

        let resource = configured(PurposeResource::new(), &server.url()).await;
        let prior = research(Dynamic::Number(12.0), Dynamic::Null);
        let mut planned = prior.clone();
        planned
            .set_string(&AttributePath::new("description"), "Medical research".to_string())
            .unwrap();

        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "immuta_purpose".to_string(),
                    prior_state: prior,
                    config: planned.clone(),
                    planned_state: planned.clone(),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.new_state, planned);
        upsert.assert_async().await;
    }

    async fn delete_answered_with(status: usize) -> DeleteResourceResponse {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/governance/purpose/5")
            .with_status(status)
            .create_async()
            .await;

        let resource = configured(PurposeResource::new(), &server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "immuta_purpose".to_string(),
                    prior_state: research(Dynamic::Number(5.0), Dynamic::Null),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;
        mock.assert_async().await;
        response
    }

    #[tokio::test]
    async fn delete_removes_purpose() {
        assert!(delete_answered_with(200).await.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn delete_of_missing_purpose_succeeds() {
        assert!(delete_answered_with(404).await.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn delete_failure_reports_diagnostic() {
        let response = delete_answered_with(500).await;
        assert_eq!(response.diagnostics[0].summary, "Failed to delete purpose");
    }
}
