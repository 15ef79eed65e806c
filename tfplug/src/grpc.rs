//! gRPC service implementation of the Terraform Plugin Protocol 6
//!
//! Resources are created on demand from the provider's factories, configured
//! with the data produced by `ConfigureProvider`, and dropped after the call.
//! The framework owns schema validation, planning of computed attributes and
//! the create/update/delete dispatch of `ApplyResourceChange`.

use crate::context::Context;
use crate::plan_modifier::{values_equal, PlanModifyRequest};
use crate::proto;
use crate::provider::{
    ConfigureProviderRequest, Provider, ProviderMetadataRequest, ProviderSchemaRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ManagedResource, ReadResourceRequest, ResourceSchemaRequest,
    UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::{Attribute, AttributeType, ObjectNestingMode, Schema, StringKind};
use crate::types::{
    has_errors, AttributePath, AttributePathStep, ClientCapabilities, Diagnostic,
    DiagnosticSeverity, Dynamic, DynamicValue,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};

type ProviderData = Option<Arc<dyn Any + Send + Sync>>;

pub struct GrpcProviderServer<P: Provider> {
    provider: Arc<RwLock<P>>,
    provider_data: Arc<RwLock<ProviderData>>,
}

impl<P: Provider + 'static> GrpcProviderServer<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(RwLock::new(provider)),
            provider_data: Arc::new(RwLock::new(None)),
        }
    }

    /// Unconfigured instance, enough for schema and validation calls
    async fn new_resource(
        &self,
        type_name: &str,
    ) -> std::result::Result<Box<dyn ManagedResource>, Vec<Diagnostic>> {
        let provider = self.provider.read().await;
        let factories = provider.resources();
        match factories.get(type_name) {
            Some(factory) => Ok(factory()),
            None => Err(vec![Diagnostic::error(
                format!("Unknown resource type: {}", type_name),
                format!(
                    "The provider does not implement a resource named '{}'",
                    type_name
                ),
            )]),
        }
    }

    async fn configured_resource(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> std::result::Result<Box<dyn ManagedResource>, Vec<Diagnostic>> {
        let mut resource = self.new_resource(type_name).await?;
        let provider_data = self.provider_data.read().await.clone();

        let response = resource
            .configure(ctx.clone(), ConfigureResourceRequest { provider_data })
            .await;

        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(resource)
    }

    async fn resource_schema(
        &self,
        ctx: &Context,
        resource: &dyn ManagedResource,
    ) -> std::result::Result<Schema, Vec<Diagnostic>> {
        let response = resource.schema(ctx.clone(), ResourceSchemaRequest).await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(response.schema)
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> proto::ProviderService for GrpcProviderServer<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> std::result::Result<Response<proto::get_metadata::Response>, Status> {
        let provider = self.provider.read().await;
        let metadata = provider
            .metadata(Context::for_operation("GetMetadata"), ProviderMetadataRequest)
            .await;
        let mut resources: Vec<String> = provider.resources().into_keys().collect();
        resources.sort();

        tracing::debug!(
            provider = %metadata.type_name,
            version = %metadata.version,
            resources = resources.len(),
            "served metadata"
        );

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities()),
            diagnostics: vec![],
            data_sources: vec![],
            resources: resources
                .into_iter()
                .map(|type_name| proto::get_metadata::ResourceMetadata { type_name })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> std::result::Result<Response<proto::get_provider_schema::Response>, Status> {
        let ctx = Context::for_operation("GetProviderSchema");
        let provider = self.provider.read().await;

        let provider_schema = provider.schema(ctx.clone(), ProviderSchemaRequest).await;
        let mut diagnostics = provider_schema.diagnostics;

        let mut resource_schemas = HashMap::new();
        for (type_name, factory) in provider.resources() {
            let resource = factory();
            let response = resource.schema(ctx.clone(), ResourceSchemaRequest).await;
            diagnostics.extend(response.diagnostics);
            resource_schemas.insert(type_name, schema_to_proto(&response.schema));
        }

        tracing::debug!(
            resources = resource_schemas.len(),
            "served provider schema"
        );

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(schema_to_proto(&provider_schema.schema)),
            resource_schemas,
            data_source_schemas: HashMap::new(),
            diagnostics: diagnostics_to_proto(diagnostics),
            provider_meta: None,
            server_capabilities: Some(server_capabilities()),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> std::result::Result<Response<proto::validate_provider_config::Response>, Status> {
        let req = request.into_inner();
        let config = decode_dynamic_value(&req.config)?;

        let provider = self.provider.read().await;
        let schema = provider
            .schema(
                Context::for_operation("ValidateProviderConfig"),
                ProviderSchemaRequest,
            )
            .await
            .schema;

        let mut diagnostics = Vec::new();
        validate_attributes(
            &schema.block.attributes,
            &config.value,
            &AttributePath::root(),
            &mut diagnostics,
        );

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_resource_config::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::for_operation("ValidateResourceConfig");
        let config = decode_dynamic_value(&req.config)?;

        let diagnostics = match self.new_resource(&req.type_name).await {
            Err(diags) => diags,
            Ok(resource) => match self.resource_schema(&ctx, resource.as_ref()).await {
                Err(diags) => diags,
                Ok(schema) => {
                    let mut diagnostics = Vec::new();
                    validate_attributes(
                        &schema.block.attributes,
                        &config.value,
                        &AttributePath::root(),
                        &mut diagnostics,
                    );

                    if !has_errors(&diagnostics) {
                        let response = resource
                            .validate(
                                ctx,
                                ValidateResourceConfigRequest {
                                    type_name: req.type_name.clone(),
                                    config,
                                    client_capabilities: client_capabilities(
                                        req.client_capabilities,
                                    ),
                                },
                            )
                            .await;
                        diagnostics.extend(response.diagnostics);
                    }
                    diagnostics
                }
            },
        };

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_data_resource_config::Response>, Status> {
        let req = request.into_inner();
        Ok(Response::new(
            proto::validate_data_resource_config::Response {
                diagnostics: diagnostics_to_proto(vec![unknown_data_source(&req.type_name)]),
            },
        ))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> std::result::Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::for_operation("UpgradeResourceState");

        let schema = match self.new_resource(&req.type_name).await {
            Ok(resource) => self.resource_schema(&ctx, resource.as_ref()).await,
            Err(diags) => Err(diags),
        };
        let schema = match schema {
            Ok(schema) => schema,
            Err(diags) => {
                return Ok(Response::new(proto::upgrade_resource_state::Response {
                    upgraded_state: None,
                    diagnostics: diagnostics_to_proto(diags),
                }))
            }
        };

        let raw_json = req
            .raw_state
            .map(|raw| raw.json)
            .unwrap_or_default();
        let stored = DynamicValue::decode_json(&raw_json)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;

        if req.version != schema.version {
            tracing::warn!(
                type_name = %req.type_name,
                stored = req.version,
                current = schema.version,
                "state version differs from schema version, passing through"
            );
        }

        let upgraded = conform_to_schema(&schema.block.attributes, stored.value);

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state: Some(encode_dynamic_value(&DynamicValue::new(upgraded))?),
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> std::result::Result<Response<proto::configure_provider::Response>, Status> {
        let req = request.into_inner();
        let config = decode_dynamic_value(&req.config)?;

        let mut provider = self.provider.write().await;
        let response = provider
            .configure(
                Context::for_operation("ConfigureProvider"),
                ConfigureProviderRequest {
                    terraform_version: req.terraform_version,
                    config,
                    client_capabilities: client_capabilities(req.client_capabilities),
                },
            )
            .await;

        if !has_errors(&response.diagnostics) {
            *self.provider_data.write().await = response.provider_data;
            tracing::info!("provider configured");
        }

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> std::result::Result<Response<proto::read_resource::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::for_operation("ReadResource");
        let current_state = decode_dynamic_value(&req.current_state)?;

        let resource = match self.configured_resource(&ctx, &req.type_name).await {
            Ok(resource) => resource,
            Err(diags) => {
                return Ok(Response::new(proto::read_resource::Response {
                    new_state: req.current_state,
                    diagnostics: diagnostics_to_proto(diags),
                    private: req.private,
                }))
            }
        };
        let schema = match self.resource_schema(&ctx, resource.as_ref()).await {
            Ok(schema) => schema,
            Err(diags) => {
                return Ok(Response::new(proto::read_resource::Response {
                    new_state: req.current_state,
                    diagnostics: diagnostics_to_proto(diags),
                    private: req.private,
                }))
            }
        };

        let response = resource
            .read(
                ctx,
                ReadResourceRequest {
                    type_name: req.type_name.clone(),
                    current_state,
                    private: req.private,
                    provider_meta: decode_optional(&req.provider_meta)?,
                    client_capabilities: client_capabilities(req.client_capabilities),
                },
            )
            .await;

        // None means the remote object is gone; a null state drops it
        let new_state = match response.new_state {
            Some(state) => DynamicValue::new(conform_to_schema(
                &schema.block.attributes,
                state.value,
            )),
            None => {
                tracing::info!(type_name = %req.type_name, "resource no longer exists, removing from state");
                DynamicValue::null()
            }
        };

        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            diagnostics: diagnostics_to_proto(response.diagnostics),
            private: response.private,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> std::result::Result<Response<proto::plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::for_operation("PlanResourceChange");

        let prior_state = decode_dynamic_value(&req.prior_state)?;
        let proposed_new_state = decode_dynamic_value(&req.proposed_new_state)?;
        let config = decode_dynamic_value(&req.config)?;

        // Destroy plans pass through untouched
        if proposed_new_state.is_null() {
            return Ok(Response::new(proto::plan_resource_change::Response {
                planned_state: Some(encode_dynamic_value(&proposed_new_state)?),
                requires_replace: vec![],
                planned_private: req.prior_private,
                diagnostics: vec![],
                legacy_type_system: false,
            }));
        }

        let schema = match self.new_resource(&req.type_name).await {
            Ok(resource) => self.resource_schema(&ctx, resource.as_ref()).await,
            Err(diags) => Err(diags),
        };
        let schema = match schema {
            Ok(schema) => schema,
            Err(diags) => {
                return Ok(Response::new(proto::plan_resource_change::Response {
                    planned_state: None,
                    requires_replace: vec![],
                    planned_private: vec![],
                    diagnostics: diagnostics_to_proto(diags),
                    legacy_type_system: false,
                }))
            }
        };

        let creating = prior_state.is_null();
        let mut planned = proposed_new_state.value.clone();

        if creating || !values_equal(&proposed_new_state.value, &prior_state.value) {
            mark_computed_unknown(
                &schema.block.attributes,
                &mut planned,
                &config.value,
                &prior_state.value,
            );
        }

        let mut requires_replace = Vec::new();
        let mut diagnostics = Vec::new();

        if let Dynamic::Map(planned_attrs) = &mut planned {
            for attr in &schema.block.attributes {
                if attr.plan_modifiers.is_empty() {
                    continue;
                }

                let path = AttributePath::new(&attr.name);
                let state_value = field(&prior_state.value, &attr.name);
                let config_value = field(&config.value, &attr.name);
                let mut plan_value = planned_attrs
                    .get(&attr.name)
                    .cloned()
                    .unwrap_or(Dynamic::Null);

                for modifier in &attr.plan_modifiers {
                    let response = modifier.modify_plan(PlanModifyRequest {
                        state: state_value.clone(),
                        plan: plan_value,
                        config: config_value.clone(),
                        attribute_path: path.clone(),
                        creating,
                    });

                    plan_value = response.plan_value;
                    diagnostics.extend(response.diagnostics);

                    if response.requires_replace
                        && !requires_replace.iter().any(|p: &AttributePath| p == &path)
                    {
                        requires_replace.push(path.clone());
                    }
                }

                planned_attrs.insert(attr.name.clone(), plan_value);
            }
        }

        tracing::debug!(
            type_name = %req.type_name,
            creating,
            replace = requires_replace.len(),
            "planned resource change"
        );

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(encode_dynamic_value(&DynamicValue::new(planned))?),
            requires_replace: requires_replace.iter().map(path_to_proto).collect(),
            planned_private: req.prior_private,
            diagnostics: diagnostics_to_proto(diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> std::result::Result<Response<proto::apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::for_operation("ApplyResourceChange");

        let prior_state = decode_dynamic_value(&req.prior_state)?;
        let planned_state = decode_dynamic_value(&req.planned_state)?;
        let config = decode_dynamic_value(&req.config)?;
        let provider_meta = decode_optional(&req.provider_meta)?;

        let resource = match self.configured_resource(&ctx, &req.type_name).await {
            Ok(resource) => resource,
            Err(diags) => {
                return Ok(Response::new(proto::apply_resource_change::Response {
                    new_state: Some(encode_dynamic_value(&prior_state)?),
                    private: vec![],
                    diagnostics: diagnostics_to_proto(diags),
                    legacy_type_system: false,
                }))
            }
        };
        let schema = match self.resource_schema(&ctx, resource.as_ref()).await {
            Ok(schema) => schema,
            Err(diags) => {
                return Ok(Response::new(proto::apply_resource_change::Response {
                    new_state: Some(encode_dynamic_value(&prior_state)?),
                    private: vec![],
                    diagnostics: diagnostics_to_proto(diags),
                    legacy_type_system: false,
                }))
            }
        };

        let (new_state, private, diagnostics) = if planned_state.is_null() {
            tracing::debug!(type_name = %req.type_name, "applying delete");
            let response = resource
                .delete(
                    ctx,
                    DeleteResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state: prior_state.clone(),
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;

            let state = if has_errors(&response.diagnostics) {
                prior_state
            } else {
                DynamicValue::null()
            };
            (state, vec![], response.diagnostics)
        } else if prior_state.is_null() {
            tracing::debug!(type_name = %req.type_name, "applying create");
            let response = resource
                .create(
                    ctx,
                    CreateResourceRequest {
                        type_name: req.type_name.clone(),
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;

            let state = if has_errors(&response.diagnostics) {
                DynamicValue::null()
            } else {
                finalize_state(&schema, response.new_state)
            };
            (state, response.private, response.diagnostics)
        } else {
            tracing::debug!(type_name = %req.type_name, "applying update");
            let response = resource
                .update(
                    ctx,
                    UpdateResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state: prior_state.clone(),
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;

            let state = if has_errors(&response.diagnostics) {
                prior_state
            } else {
                finalize_state(&schema, response.new_state)
            };
            (state, response.private, response.diagnostics)
        };

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            private,
            diagnostics: diagnostics_to_proto(diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> std::result::Result<Response<proto::import_resource_state::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::for_operation("ImportResourceState");

        let resource = match self.configured_resource(&ctx, &req.type_name).await {
            Ok(resource) => resource,
            Err(diags) => {
                return Ok(Response::new(proto::import_resource_state::Response {
                    imported_resources: vec![],
                    diagnostics: diagnostics_to_proto(diags),
                }))
            }
        };
        let schema = match self.resource_schema(&ctx, resource.as_ref()).await {
            Ok(schema) => schema,
            Err(diags) => {
                return Ok(Response::new(proto::import_resource_state::Response {
                    imported_resources: vec![],
                    diagnostics: diagnostics_to_proto(diags),
                }))
            }
        };

        tracing::info!(type_name = %req.type_name, id = %req.id, "importing resource");

        let response = resource
            .import_state(
                ctx,
                ImportResourceStateRequest {
                    type_name: req.type_name.clone(),
                    id: req.id,
                    client_capabilities: client_capabilities(req.client_capabilities),
                },
            )
            .await;

        let mut imported_resources = Vec::with_capacity(response.imported_resources.len());
        for imported in response.imported_resources {
            let state = finalize_state(&schema, imported.state);
            imported_resources.push(proto::import_resource_state::ImportedResource {
                type_name: imported.type_name,
                state: Some(encode_dynamic_value(&state)?),
                private: imported.private,
            });
        }

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> std::result::Result<Response<proto::read_data_source::Response>, Status> {
        let req = request.into_inner();
        Ok(Response::new(proto::read_data_source::Response {
            state: None,
            diagnostics: diagnostics_to_proto(vec![unknown_data_source(&req.type_name)]),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> std::result::Result<Response<proto::stop_provider::Response>, Status> {
        tracing::info!("stop requested");
        Ok(Response::new(proto::stop_provider::Response {
            error: String::new(),
        }))
    }
}

fn server_capabilities() -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: false,
        get_provider_schema_optional: false,
        move_resource_state: false,
    }
}

fn client_capabilities(caps: Option<proto::ClientCapabilities>) -> ClientCapabilities {
    caps.map(|c| ClientCapabilities {
        deferral_allowed: c.deferral_allowed,
        write_only_attributes_allowed: c.write_only_attributes_allowed,
    })
    .unwrap_or_default()
}

fn unknown_data_source(type_name: &str) -> Diagnostic {
    Diagnostic::error(
        format!("Unknown data source type: {}", type_name),
        "This provider does not implement any data sources",
    )
}

fn field(value: &Dynamic, name: &str) -> Dynamic {
    value
        .as_map()
        .and_then(|m| m.get(name))
        .cloned()
        .unwrap_or(Dynamic::Null)
}

fn finalize_state(schema: &Schema, state: DynamicValue) -> DynamicValue {
    DynamicValue::new(conform_to_schema(&schema.block.attributes, state.value).null_unknowns())
}

// Schema conversion

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(proto::schema::Block {
            version: schema.block.version,
            attributes: schema
                .block
                .attributes
                .iter()
                .map(attribute_to_proto)
                .collect(),
            block_types: vec![],
            description: schema.block.description.clone(),
            description_kind: string_kind(schema.block.description_kind),
            deprecated: schema.block.deprecated,
        }),
    }
}

fn attribute_to_proto(attr: &Attribute) -> proto::schema::Attribute {
    let (r#type, nested_type) = match &attr.nested_type {
        Some(nested) => (
            vec![],
            Some(proto::schema::Object {
                attributes: nested.attributes.iter().map(attribute_to_proto).collect(),
                nesting: nesting_mode(nested.nesting),
            }),
        ),
        None => (attr.r#type.to_bytes(), None),
    };

    proto::schema::Attribute {
        name: attr.name.clone(),
        r#type,
        nested_type,
        description: attr.description.clone(),
        required: attr.required,
        optional: attr.optional,
        computed: attr.computed,
        sensitive: attr.sensitive,
        description_kind: string_kind(StringKind::Plain),
        deprecated: attr.deprecated,
        write_only: false,
    }
}

fn nesting_mode(mode: ObjectNestingMode) -> i32 {
    use proto::schema::object::NestingMode;
    (match mode {
        ObjectNestingMode::Invalid => NestingMode::Invalid,
        ObjectNestingMode::Single => NestingMode::Single,
        ObjectNestingMode::List => NestingMode::List,
        ObjectNestingMode::Set => NestingMode::Set,
        ObjectNestingMode::Map => NestingMode::Map,
    }) as i32
}

fn string_kind(kind: StringKind) -> i32 {
    (match kind {
        StringKind::Plain => proto::StringKind::Plain,
        StringKind::Markdown => proto::StringKind::Markdown,
    }) as i32
}

// Value codec

#[allow(clippy::result_large_err)]
pub(crate) fn decode_dynamic_value(
    value: &Option<proto::DynamicValue>,
) -> std::result::Result<DynamicValue, Status> {
    let value = match value {
        Some(v) => v,
        None => return Ok(DynamicValue::null()),
    };

    if !value.msgpack.is_empty() {
        DynamicValue::decode_msgpack(&value.msgpack).map_err(|e| {
            let preview = &value.msgpack[..value.msgpack.len().min(32)];
            tracing::error!(?preview, "failed to decode msgpack value");
            Status::invalid_argument(e.to_string())
        })
    } else if !value.json.is_empty() {
        DynamicValue::decode_json(&value.json).map_err(|e| Status::invalid_argument(e.to_string()))
    } else {
        Ok(DynamicValue::null())
    }
}

#[allow(clippy::result_large_err)]
fn decode_optional(
    value: &Option<proto::DynamicValue>,
) -> std::result::Result<Option<DynamicValue>, Status> {
    let decoded = decode_dynamic_value(value)?;
    Ok((!decoded.is_null()).then_some(decoded))
}

#[allow(clippy::result_large_err)]
pub(crate) fn encode_dynamic_value(
    value: &DynamicValue,
) -> std::result::Result<proto::DynamicValue, Status> {
    let msgpack = value
        .encode_msgpack()
        .map_err(|e| Status::internal(e.to_string()))?;

    Ok(proto::DynamicValue {
        msgpack,
        json: vec![],
    })
}

// Diagnostics

fn path_to_proto(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::step::Selector;

    proto::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| proto::attribute_path::Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                }),
            })
            .collect(),
    }
}

fn diagnostics_to_proto(diags: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    diags
        .into_iter()
        .map(|d| proto::Diagnostic {
            severity: (match d.severity {
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
                DiagnosticSeverity::Invalid => proto::diagnostic::Severity::Invalid,
            }) as i32,
            summary: d.summary,
            detail: d.detail,
            attribute: d.attribute.as_ref().map(path_to_proto),
        })
        .collect()
}

// Validation

fn validate_attributes(
    attrs: &[Attribute],
    object: &Dynamic,
    base: &AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let fields = match object {
        Dynamic::Map(fields) => fields,
        _ => return,
    };

    for attr in attrs {
        let path = child_path(base, &attr.name);
        let value = fields.get(&attr.name).unwrap_or(&Dynamic::Null);

        match value {
            Dynamic::Unknown => continue,
            Dynamic::Null => {
                if attr.required {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("Missing required argument: {}", path),
                            format!("The argument '{}' is required, but no definition was found", path),
                        )
                        .with_attribute(path),
                    );
                }
                continue;
            }
            _ => {}
        }

        if !validate_dynamic_type(value, &attr.r#type) {
            diagnostics.push(
                Diagnostic::error(
                    format!("Type mismatch for field: {}", path),
                    format!(
                        "Field '{}' expects type {:?} but got {}",
                        path,
                        attr.r#type,
                        value.type_name()
                    ),
                )
                .with_attribute(path),
            );
            continue;
        }

        if value.is_fully_known() {
            for validator in &attr.validators {
                validator.validate(value, &path, diagnostics);
            }
        }

        if let Some(nested) = &attr.nested_type {
            match (nested.nesting, value) {
                (ObjectNestingMode::Single, object) => {
                    validate_attributes(&nested.attributes, object, &path, diagnostics)
                }
                (ObjectNestingMode::List, Dynamic::List(items))
                | (ObjectNestingMode::Set, Dynamic::List(items)) => {
                    for (i, item) in items.iter().enumerate() {
                        validate_attributes(
                            &nested.attributes,
                            item,
                            &path.clone().index(i as i64),
                            diagnostics,
                        );
                    }
                }
                _ => {}
            }
        }
    }

    for name in fields.keys() {
        if !attrs.iter().any(|a| &a.name == name) {
            let path = child_path(base, name);
            diagnostics.push(
                Diagnostic::error(
                    format!("Unknown field: {}", path),
                    format!("The field '{}' is not defined in the schema", path),
                )
                .with_attribute(path),
            );
        }
    }
}

fn child_path(base: &AttributePath, name: &str) -> AttributePath {
    base.clone().attribute(name)
}

fn validate_dynamic_type(value: &Dynamic, expected_type: &AttributeType) -> bool {
    match (value, expected_type) {
        (Dynamic::Null, _) | (Dynamic::Unknown, _) => true,
        (Dynamic::String(_), AttributeType::String) => true,
        (Dynamic::Number(_), AttributeType::Number) => true,
        (Dynamic::Bool(_), AttributeType::Bool) => true,
        (Dynamic::List(list), AttributeType::List(elem_type))
        | (Dynamic::List(list), AttributeType::Set(elem_type)) => list
            .iter()
            .all(|elem| validate_dynamic_type(elem, elem_type)),
        (Dynamic::Map(map), AttributeType::Map(elem_type)) => map
            .values()
            .all(|elem| validate_dynamic_type(elem, elem_type)),
        (Dynamic::Map(map), AttributeType::Object(attrs)) => attrs.iter().all(|(name, ty)| {
            map.get(name)
                .map_or(true, |value| validate_dynamic_type(value, ty))
        }),
        _ => false,
    }
}

// Planning

/// Marks computed attributes that the configuration leaves null as unknown.
/// Nested list elements identical to the prior element at the same index keep
/// their computed values.
fn mark_computed_unknown(
    attrs: &[Attribute],
    planned: &mut Dynamic,
    config: &Dynamic,
    prior: &Dynamic,
) {
    let Dynamic::Map(planned_fields) = planned else {
        return;
    };

    for attr in attrs {
        let config_value = field(config, &attr.name);
        let prior_value = field(prior, &attr.name);

        if attr.computed && config_value.is_null() {
            planned_fields.insert(attr.name.clone(), Dynamic::Unknown);
            continue;
        }

        let (Some(nested), Some(planned_value)) =
            (&attr.nested_type, planned_fields.get_mut(&attr.name))
        else {
            continue;
        };

        match (nested.nesting, planned_value) {
            (ObjectNestingMode::Single, value @ Dynamic::Map(_)) => {
                if !values_equal(value, &prior_value) {
                    mark_computed_unknown(&nested.attributes, value, &config_value, &prior_value);
                }
            }
            (ObjectNestingMode::List, Dynamic::List(items)) => {
                let config_items = config_value.as_list().cloned().unwrap_or_default();
                let prior_items = prior_value.as_list().cloned().unwrap_or_default();

                for (i, item) in items.iter_mut().enumerate() {
                    let prior_item = prior_items.get(i).cloned().unwrap_or(Dynamic::Null);
                    if values_equal(item, &prior_item) {
                        continue;
                    }
                    let config_item = config_items.get(i).cloned().unwrap_or(Dynamic::Null);
                    mark_computed_unknown(&nested.attributes, item, &config_item, &prior_item);
                }
            }
            _ => {}
        }
    }
}

/// Produces an object with exactly the schema's attributes, filling gaps with
/// null and dropping anything the schema does not declare
fn conform_to_schema(attrs: &[Attribute], value: Dynamic) -> Dynamic {
    let mut fields = match value {
        Dynamic::Map(fields) => fields,
        other => return other,
    };

    let conformed = attrs
        .iter()
        .map(|attr| {
            let value = fields.remove(&attr.name).unwrap_or(Dynamic::Null);
            let value = match (&attr.nested_type, value) {
                (Some(nested), Dynamic::List(items))
                    if nested.nesting != ObjectNestingMode::Single =>
                {
                    Dynamic::List(
                        items
                            .into_iter()
                            .map(|item| conform_to_schema(&nested.attributes, item))
                            .collect(),
                    )
                }
                (Some(nested), value @ Dynamic::Map(_)) => {
                    conform_to_schema(&nested.attributes, value)
                }
                (_, value) => value,
            };
            (attr.name.clone(), value)
        })
        .collect();

    Dynamic::Map(conformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan_modifier::UseStateForUnknown;
    use crate::schema::{AttributeBuilder, NestedType};

    fn member_attrs() -> Vec<Attribute> {
        vec![
            AttributeBuilder::new("userid", AttributeType::String)
                .required()
                .build(),
            AttributeBuilder::new("id", AttributeType::Number)
                .computed()
                .plan_modifier(UseStateForUnknown)
                .build(),
        ]
    }

    fn member(userid: &str, id: Dynamic) -> Dynamic {
        Dynamic::Map(HashMap::from([
            ("userid".to_string(), Dynamic::from(userid)),
            ("id".to_string(), id),
        ]))
    }

    #[test]
    fn computed_nested_values_survive_unchanged_elements() {
        let attrs = vec![AttributeBuilder::nested("users", NestedType::list(member_attrs()))
            .required()
            .build()];

        let prior = Dynamic::Map(HashMap::from([(
            "users".to_string(),
            Dynamic::List(vec![member("alice", Dynamic::Number(1.0))]),
        )]));
        let config = Dynamic::Map(HashMap::from([(
            "users".to_string(),
            Dynamic::List(vec![member("alice", Dynamic::Null), member("bob", Dynamic::Null)]),
        )]));
        let mut planned = Dynamic::Map(HashMap::from([(
            "users".to_string(),
            Dynamic::List(vec![member("alice", Dynamic::Number(1.0)), member("bob", Dynamic::Null)]),
        )]));

        mark_computed_unknown(&attrs, &mut planned, &config, &prior);

        let users = field(&planned, "users");
        let users = users.as_list().unwrap();
        assert_eq!(field(&users[0], "id"), Dynamic::Number(1.0));
        assert_eq!(field(&users[1], "id"), Dynamic::Unknown);
    }

    #[test]
    fn conform_fills_missing_and_drops_extra() {
        let value = Dynamic::Map(HashMap::from([
            ("userid".to_string(), Dynamic::from("alice")),
            ("stray".to_string(), Dynamic::Bool(true)),
        ]));

        let conformed = conform_to_schema(&member_attrs(), value);
        let fields = conformed.as_map().unwrap();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields["id"], Dynamic::Null);
        assert!(!fields.contains_key("stray"));
    }

    #[test]
    fn validate_reports_missing_required_nested_field() {
        let attrs = vec![AttributeBuilder::nested(
            "connection_details",
            NestedType::single(vec![AttributeBuilder::new("hostname", AttributeType::String)
                .required()
                .build()]),
        )
        .required()
        .build()];

        let config = Dynamic::Map(HashMap::from([(
            "connection_details".to_string(),
            Dynamic::Map(HashMap::from([("hostname".to_string(), Dynamic::Null)])),
        )]));

        let mut diagnostics = Vec::new();
        validate_attributes(&attrs, &config, &AttributePath::root(), &mut diagnostics);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].summary,
            "Missing required argument: connection_details.hostname"
        );
    }

    #[test]
    fn type_check_accepts_unknown_and_rejects_mismatch() {
        assert!(validate_dynamic_type(&Dynamic::Unknown, &AttributeType::Number));
        assert!(!validate_dynamic_type(&Dynamic::from("x"), &AttributeType::Number));
        assert!(validate_dynamic_type(
            &Dynamic::string_list(["a"]),
            &AttributeType::list_of(AttributeType::String)
        ));
    }
}
