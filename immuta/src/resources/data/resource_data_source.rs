//! Data source resource implementation
//!
//! Registers a database connection with Immuta. The API has no read
//! endpoint for a single connection, so read only checks that the
//! connection is still registered and otherwise trusts state.

use crate::api::data_sources::{
    Connection, DataSourceInput, DataSourceOptions, NameTemplate, Owner, UserFile,
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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{NumberRangeValidator, StringOneOfValidator};

#[derive(Default)]
pub struct DataSourceResource {
    provider_data: Option<ImmutaProviderData>,
}

impl DataSourceResource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Typed access to the fields of one nested object
struct Fields<'a> {
    path: AttributePath,
    fields: &'a HashMap<String, Dynamic>,
}

impl<'a> Fields<'a> {
    fn new(path: AttributePath, value: &'a Dynamic) -> Result<Self, Diagnostic> {
        match value.as_map() {
            Some(fields) => Ok(Self { path, fields }),
            None => Err(Diagnostic::error(
                format!("Invalid value for {}", path),
                format!("Expected an object, got {}", value.type_name()),
            )
            .with_attribute(path)),
        }
    }

    fn invalid(&self, field: &str, expected: &str) -> Diagnostic {
        let path = self.path.clone().attribute(field);
        Diagnostic::error(
            format!("Invalid value for {}", path),
            format!("Expected {}", expected),
        )
        .with_attribute(path)
    }

    fn get(&self, field: &str) -> Option<&'a Dynamic> {
        self.fields
            .get(field)
            .filter(|v| !matches!(v, Dynamic::Null | Dynamic::Unknown))
    }

    fn string(&self, field: &str) -> Result<String, Diagnostic> {
        self.optional_string(field)?
            .ok_or_else(|| self.invalid(field, "a string"))
    }

    fn optional_string(&self, field: &str) -> Result<Option<String>, Diagnostic> {
        match self.get(field) {
            None => Ok(None),
            Some(Dynamic::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.invalid(field, "a string")),
        }
    }

    fn bool(&self, field: &str) -> Result<bool, Diagnostic> {
        match self.get(field) {
            None => Ok(false),
            Some(Dynamic::Bool(b)) => Ok(*b),
            Some(_) => Err(self.invalid(field, "a bool")),
        }
    }

    fn port(&self, field: &str) -> Result<Option<u16>, Diagnostic> {
        match self.get(field) {
            None => Ok(None),
            Some(Dynamic::Number(n)) if n.fract() == 0.0 && (1.0..=65535.0).contains(n) => {
                Ok(Some(*n as u16))
            }
            Some(_) => Err(self.invalid(field, "a port between 1 and 65535")),
        }
    }

    fn list(&self, field: &str) -> &'a [Dynamic] {
        match self.get(field) {
            Some(Dynamic::List(items)) => items.as_slice(),
            _ => &[],
        }
    }
}

/// Nested object at `name`, `None` when unset
fn nested<'a>(value: &'a DynamicValue, name: &str) -> Result<Option<Fields<'a>>, Diagnostic> {
    let path = AttributePath::new(name);
    match value.get(&path) {
        Ok(Dynamic::Null) | Ok(Dynamic::Unknown) | Err(_) => Ok(None),
        Ok(object) => Fields::new(path, object).map(Some),
    }
}

fn data_source_input(value: &DynamicValue) -> Result<DataSourceInput, Diagnostic> {
    let connection_key = value
        .get_string(&AttributePath::new("connection_key"))
        .map_err(|e| config_error("connection_key", e))?;

    let name_template = nested(value, "name_template")?
        .map(|t| -> Result<NameTemplate, Diagnostic> {
            Ok(NameTemplate {
                data_source_format: t.string("data_source_format")?,
                table_format: t.string("table_format")?,
                schema_format: t.string("schema_format")?,
                schema_project_name_format: t.string("schema_project_name_format")?,
            })
        })
        .transpose()?;

    let options = nested(value, "options")?
        .map(|o| -> Result<DataSourceOptions, Diagnostic> {
            Ok(DataSourceOptions {
                table_tags: o
                    .list("table_tags")
                    .iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect(),
                disable_sensitive_data_discovery: o.bool("disable_sensitive_data_discovery")?,
            })
        })
        .transpose()?;

    let owners = value
        .get_optional_list(&AttributePath::new("owners"))
        .map_err(|e| config_error("owners", e))?
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(index, item)| -> Result<Owner, Diagnostic> {
            let owner = Fields::new(AttributePath::new("owners").index(index as i64), item)?;
            Ok(Owner {
                owner_type: owner.string("type")?,
                name: owner.string("name")?,
                iam: owner.optional_string("iam")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let details = nested(value, "connection_details")?.ok_or_else(|| {
        Diagnostic::error(
            "Missing connection details",
            "connection_details must be set",
        )
        .with_attribute(AttributePath::new("connection_details"))
    })?;

    let user_files = details
        .list("user_files")
        .iter()
        .enumerate()
        .map(|(index, item)| -> Result<UserFile, Diagnostic> {
            let file = Fields::new(
                details.path.clone().attribute("user_files").index(index as i64),
                item,
            )?;
            Ok(UserFile {
                key: file.string("key")?,
                content: file.string("content")?,
                file_name: file.string("file_name")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let connection = Connection {
        handler: details.string("handler")?,
        hostname: details.string("hostname")?,
        port: details.port("port")?,
        database: details.string("database")?,
        schema: details.optional_string("schema")?,
        username: details.string("username")?,
        authentication_method: details.optional_string("authentication_method")?,
        password: details.optional_string("password")?,
        user_files,
        connection_string_options: details.optional_string("connection_string_options")?,
        ssl: details.bool("ssl")?,
        warehouse: details.optional_string("warehouse")?,
        http_path: details.optional_string("http_path")?,
    };

    Ok(DataSourceInput {
        connection_key,
        name_template,
        options,
        owners,
        connection,
    })
}

#[async_trait]
impl Resource for DataSourceResource {
    fn type_name(&self) -> &str {
        "immuta_data_source"
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
        let name_template = NestedType::single(vec![
            AttributeBuilder::new("data_source_format", AttributeType::String)
                .required()
                .build(),
            AttributeBuilder::new("table_format", AttributeType::String)
                .required()
                .build(),
            AttributeBuilder::new("schema_format", AttributeType::String)
                .required()
                .build(),
            AttributeBuilder::new("schema_project_name_format", AttributeType::String)
                .required()
                .build(),
        ]);

        let options = NestedType::single(vec![
            AttributeBuilder::new("table_tags", AttributeType::list_of(AttributeType::String))
                .optional()
                .build(),
            AttributeBuilder::new("disable_sensitive_data_discovery", AttributeType::Bool)
                .optional()
                .build(),
        ]);

        let owner = NestedType::list(vec![
            AttributeBuilder::new("type", AttributeType::String)
                .required()
                .validator(StringOneOfValidator::new(["user", "group"]))
                .build(),
            AttributeBuilder::new("name", AttributeType::String)
                .required()
                .build(),
            AttributeBuilder::new("iam", AttributeType::String)
                .description("Identity manager of the owner")
                .optional()
                .build(),
        ]);

        let user_file = NestedType::list(vec![
            AttributeBuilder::new("key", AttributeType::String)
                .required()
                .build(),
            AttributeBuilder::new("content", AttributeType::String)
                .required()
                .sensitive()
                .build(),
            AttributeBuilder::new("file_name", AttributeType::String)
                .required()
                .build(),
        ]);

        let connection = NestedType::single(vec![
            AttributeBuilder::new("handler", AttributeType::String)
                .description("Database handler, e.g. Snowflake or PostgreSQL")
                .required()
                .build(),
            AttributeBuilder::new("hostname", AttributeType::String)
                .required()
                .build(),
            AttributeBuilder::new("port", AttributeType::Number)
                .required()
                .validator(NumberRangeValidator {
                    min: Some(1.0),
                    max: Some(65535.0),
                })
                .build(),
            AttributeBuilder::new("database", AttributeType::String)
                .required()
                .build(),
            AttributeBuilder::new("schema", AttributeType::String)
                .optional()
                .build(),
            AttributeBuilder::new("username", AttributeType::String)
                .required()
                .build(),
            AttributeBuilder::new("authentication_method", AttributeType::String)
                .optional()
                .build(),
            AttributeBuilder::new("password", AttributeType::String)
                .optional()
                .sensitive()
                .build(),
            AttributeBuilder::nested("user_files", user_file)
                .optional()
                .build(),
            AttributeBuilder::new("connection_string_options", AttributeType::String)
                .optional()
                .build(),
            AttributeBuilder::new("ssl", AttributeType::Bool)
                .optional()
                .build(),
            AttributeBuilder::new("warehouse", AttributeType::String)
                .optional()
                .build(),
            AttributeBuilder::new("http_path", AttributeType::String)
                .optional()
                .build(),
        ]);

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Registers a database connection as Immuta data sources")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("connection_key", AttributeType::String)
                    .description("Unique key of the connection")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::nested("name_template", name_template)
                    .optional()
                    .build(),
            )
            .attribute(AttributeBuilder::nested("options", options).optional().build())
            .attribute(AttributeBuilder::nested("owners", owner).optional().build())
            .attribute(
                AttributeBuilder::nested("connection_details", connection)
                    .required()
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

        let input = match data_source_input(&new_state) {
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

        match client.data_sources().upsert(&input).await {
            Ok(response) => {
                tracing::debug!(
                    connection = %input.connection_key,
                    creating = response.creating.len(),
                    "registered connection"
                );
                if let Err(e) =
                    new_state.set_string(&AttributePath::new("id"), input.connection_key.clone())
                {
                    diagnostics.push(state_error(e));
                }
            }
            Err(e) => diagnostics.push(api_error("Failed to create data source", &e)),
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

        let Ok(connection_key) = request
            .current_state
            .get_string(&AttributePath::new("connection_key"))
        else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: request.private,
            };
        };

        match client.data_sources().exists(&connection_key).await {
            Ok(true) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics,
                private: request.private,
            },
            Ok(false) => ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: request.private,
            },
            Err(e) => {
                diagnostics.push(api_error("Failed to read data source", &e));
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

        let input = match data_source_input(&request.planned_state) {
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

        if let Err(e) = client.data_sources().upsert(&input).await {
            diagnostics.push(api_error("Failed to update data source", &e));
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics,
            };
        }

        let mut new_state = request.planned_state;
        if let Err(e) = new_state.set_string(&AttributePath::new("id"), input.connection_key) {
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

        let Ok(connection_key) = request
            .prior_state
            .get_string(&AttributePath::new("connection_key"))
        else {
            return DeleteResourceResponse { diagnostics };
        };

        match client.data_sources().delete(&connection_key).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => diagnostics.push(api_error("Failed to delete data source", &e)),
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for DataSourceResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_provider_data(request, &mut self.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for DataSourceResource {
    /// The import id is the connection key
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

        for imported in &mut response.imported_resources {
            if let Err(e) = imported.state.set_string(
                &AttributePath::new("connection_key"),
                request.id.clone(),
            ) {
                response.diagnostics.push(state_error(e));
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::{attr, configured, nested as object_value, object};
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn connection_details(port: f64) -> Dynamic {
        object_value(vec![
            ("handler", Dynamic::from("PostgreSQL")),
            ("hostname", Dynamic::from("db.example.com")),
            ("port", Dynamic::Number(port)),
            ("database", Dynamic::from("sales")),
            ("schema", Dynamic::Null),
            ("username", Dynamic::from("svc")),
            ("authentication_method", Dynamic::Null),
            ("password", Dynamic::from("secret")),
            ("user_files", Dynamic::Null),
            ("connection_string_options", Dynamic::Null),
            ("ssl", Dynamic::Bool(true)),
            ("warehouse", Dynamic::Null),
            ("http_path", Dynamic::Null),
        ])
    }

    fn planned(port: f64) -> DynamicValue {
        object(vec![
            ("id", Dynamic::Unknown),
            ("connection_key", Dynamic::from("sales")),
            ("name_template", Dynamic::Null),
            (
                "options",
                object_value(vec![
                    ("table_tags", Dynamic::string_list(["pii"])),
                    ("disable_sensitive_data_discovery", Dynamic::Null),
                ]),
            ),
            (
                "owners",
                Dynamic::List(vec![object_value(vec![
                    ("type", Dynamic::from("group")),
                    ("name", Dynamic::from("stewards")),
                    ("iam", Dynamic::Null),
                ])]),
            ),
            ("connection_details", connection_details(port)),
        ])
    }

    fn stored() -> DynamicValue {
        let mut state = planned(5432.0);
        state
            .set_string(&AttributePath::new("id"), "sales".to_string())
            .unwrap();
        state
    }

    fn read_request(state: DynamicValue) -> ReadResourceRequest {
        ReadResourceRequest {
            type_name: "immuta_data_source".to_string(),
            current_state: state,
            private: vec![],
            provider_meta: None,
            client_capabilities: Default::default(),
        }
    }

    #[test]
    fn input_maps_nested_blocks() {
        let input = data_source_input(&planned(5432.0)).unwrap();

        assert_eq!(input.connection.port, Some(5432));
        assert!(input.connection.ssl);
        assert_eq!(input.options.unwrap().table_tags, vec!["pii".to_string()]);
        assert_eq!(input.owners[0].owner_type, "group");
        assert!(input.name_template.is_none());
    }

    #[test]
    fn input_rejects_out_of_range_port() {
        let diag = data_source_input(&planned(70000.0)).unwrap_err();
        assert_eq!(
            diag.attribute,
            Some(AttributePath::new("connection_details").attribute("port"))
        );
    }

    #[tokio::test]
    async fn create_registers_connection() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/data")
            .match_query(Matcher::UrlEncoded("dryRun".into(), "false".into()))
            .match_body(Matcher::Json(json!({
                "connectionKey": "sales",
                "options": {"tableTags": ["pii"]},
                "owners": [{"type": "group", "name": "stewards"}],
                "connection": {
                    "handler": "PostgreSQL",
                    "hostname": "db.example.com",
                    "port": 5432,
                    "database": "sales",
                    "username": "svc",
                    "password": "secret",
                    "ssl": true
                }
            })))
            .with_body(r#"{"creating":["sales.public.orders"]}"#)
            .create_async()
            .await;

        let resource = configured(DataSourceResource::new(), &server.url()).await;
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "immuta_data_source".to_string(),
                    config: planned(5432.0),
                    planned_state: planned(5432.0),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.new_state, stored());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn read_keeps_state_while_registered() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/v2/data/sales")
            .match_query(Matcher::UrlEncoded("dryRun".into(), "true".into()))
            .with_body(r#"{"dryRun":true,"deleting":["sales.public.orders"]}"#)
            .create_async()
            .await;

        let resource = configured(DataSourceResource::new(), &server.url()).await;
        let response = resource.read(Context::new(), read_request(stored())).await;

        assert_eq!(response.new_state, Some(stored()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn read_of_unregistered_connection_removes_state() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/api/v2/data/sales")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let resource = configured(DataSourceResource::new(), &server.url()).await;
        let response = resource.read(Context::new(), read_request(stored())).await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    fn update_request(planned_state: DynamicValue) -> UpdateResourceRequest {
        UpdateResourceRequest {
            type_name: "immuta_data_source".to_string(),
            prior_state: stored(),
            config: planned_state.clone(),
            planned_state,
            planned_private: vec![],
            provider_meta: None,
        }
    }

    #[tokio::test]
    async fn update_upserts_changed_connection() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/data")
            .match_query(Matcher::UrlEncoded("dryRun".into(), "false".into()))
            .match_body(Matcher::PartialJson(json!({
                "connectionKey": "sales",
                "connection": {"port": 5433}
            })))
            .with_body(r#"{"updating":["sales.public.orders"]}"#)
            .create_async()
            .await;

        let mut changed = planned(5433.0);
        changed
            .set_string(&AttributePath::new("id"), "sales".to_string())
            .unwrap();

        let resource = configured(DataSourceResource::new(), &server.url()).await;
        let response = resource
            .update(Context::new(), update_request(changed.clone()))
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.new_state, changed);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failed_update_keeps_prior_state() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v2/data")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("connection refused")
            .create_async()
            .await;

        let resource = configured(DataSourceResource::new(), &server.url()).await;
        let response = resource
            .update(Context::new(), update_request(planned(5433.0)))
            .await;

        assert_eq!(response.diagnostics[0].summary, "Failed to update data source");
        assert_eq!(response.new_state, stored());
    }

    async fn delete_answered_with(status: usize) -> DeleteResourceResponse {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/v2/data/sales")
            .with_status(status)
            .create_async()
            .await;

        let resource = configured(DataSourceResource::new(), &server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "immuta_data_source".to_string(),
                    prior_state: stored(),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;
        mock.assert_async().await;
        response
    }

    #[tokio::test]
    async fn delete_removes_connection() {
        assert!(delete_answered_with(200).await.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn delete_of_missing_connection_succeeds() {
        assert!(delete_answered_with(404).await.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn delete_failure_reports_diagnostic() {
        let response = delete_answered_with(500).await;
        assert_eq!(response.diagnostics[0].summary, "Failed to delete data source");
    }

    #[tokio::test]
    async fn import_sets_connection_key() {
        let resource = DataSourceResource::new();
        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "immuta_data_source".to_string(),
                    id: "sales".to_string(),
                    client_capabilities: Default::default(),
                },
            )
            .await;

        let state = &response.imported_resources[0].state;
        assert_eq!(attr(state, "id"), Dynamic::from("sales"));
        assert_eq!(attr(state, "connection_key"), Dynamic::from("sales"));
    }
}
