//! BIM group membership resource implementation
//!
//! One instance owns the full member list of a single group. The group is
//! named by the `group` field of the members, and the resource id is that
//! group's id.

use crate::api::bim::group_users::{AddMemberRequest, GroupMember};
use crate::api::Client;
use crate::resources::{api_error, client, configure_provider_data, state_error};
use crate::ImmutaProviderData;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
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

#[derive(Default)]
pub struct GroupUsersResource {
    provider_data: Option<ImmutaProviderData>,
}

impl GroupUsersResource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One element of the `users` list
#[derive(Debug, Clone, PartialEq)]
struct Member {
    group: i64,
    /// Membership id, known once the user has been added
    id: Option<i64>,
    userid: String,
    iamid: String,
    profile: Option<i64>,
}

impl Member {
    fn from_dynamic(value: &Dynamic, index: usize) -> Result<Self, Diagnostic> {
        let invalid = |field: &str| {
            Diagnostic::error(
                "Invalid group member",
                format!("users[{}].{} is missing or has the wrong type", index, field),
            )
            .with_attribute(AttributePath::new("users").index(index as i64).attribute(field))
        };
        let fields = value.as_map().ok_or_else(|| invalid("group"))?;
        let number = |name: &str| fields.get(name).and_then(Dynamic::as_number).map(|n| n as i64);
        let string = |name: &str| fields.get(name).and_then(Dynamic::as_str).map(str::to_string);

        Ok(Self {
            group: number("group").ok_or_else(|| invalid("group"))?,
            id: number("id"),
            userid: string("userid").ok_or_else(|| invalid("userid"))?,
            iamid: string("iamid").ok_or_else(|| invalid("iamid"))?,
            profile: number("profile"),
        })
    }

    fn from_api(member: &GroupMember) -> Self {
        Self {
            group: member.group,
            id: Some(member.id),
            userid: member.userid.clone(),
            iamid: member.iamid.clone(),
            profile: Some(member.profile.id),
        }
    }

    fn to_dynamic(&self) -> Dynamic {
        let number = |n: Option<i64>| n.map(|n| Dynamic::Number(n as f64)).unwrap_or(Dynamic::Null);
        Dynamic::Map(HashMap::from([
            ("group".to_string(), Dynamic::Number(self.group as f64)),
            ("id".to_string(), number(self.id)),
            ("userid".to_string(), Dynamic::String(self.userid.clone())),
            ("iamid".to_string(), Dynamic::String(self.iamid.clone())),
            ("profile".to_string(), number(self.profile)),
        ]))
    }
}

fn members(state: &DynamicValue) -> Result<Vec<Member>, Diagnostic> {
    state
        .get_optional_list(&AttributePath::new("users"))
        .map_err(|e| Diagnostic::error("Invalid users list", e.to_string()))?
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(index, value)| Member::from_dynamic(value, index))
        .collect()
}

fn set_members(state: &mut DynamicValue, group_id: i64, members: &[Member]) -> tfplug::Result<()> {
    state.set_number(&AttributePath::new("id"), group_id as f64)?;
    state.set_list(
        &AttributePath::new("users"),
        members.iter().map(Member::to_dynamic).collect(),
    )
}

fn wrong_group(member: &Member, group_id: i64) -> Diagnostic {
    Diagnostic::error(
        "Member belongs to another group",
        format!(
            "User '{}' names group {} but this resource manages group {}",
            member.userid, member.group, group_id
        ),
    )
}

async fn require_group(client: &Client, group_id: i64) -> Result<(), Diagnostic> {
    match client.bim().groups().exists(group_id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(Diagnostic::error(
            "Group not found",
            format!("Group {} does not exist", group_id),
        )),
        Err(e) => Err(api_error("Failed to read group", &e)),
    }
}

/// Adds `member` and fills in the membership and profile ids
async fn add_member(client: &Client, member: &mut Member) -> Result<(), Diagnostic> {
    let request = AddMemberRequest {
        userid: member.userid.clone(),
        iamid: member.iamid.clone(),
    };
    let added = client
        .bim()
        .group_users(member.group)
        .add(&request)
        .await
        .map_err(|e| api_error(format!("Failed to add user '{}'", member.userid), &e))?;

    member.id = Some(added.id);
    member.profile = Some(added.profile);
    Ok(())
}

#[async_trait]
impl Resource for GroupUsersResource {
    fn type_name(&self) -> &str {
        "immuta_bim_group_users"
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
        let member = NestedType::list(vec![
            AttributeBuilder::new("group", AttributeType::Number)
                .description("Id of the group")
                .required()
                .build(),
            AttributeBuilder::new("id", AttributeType::Number)
                .description("Id of the membership")
                .computed()
                .build(),
            AttributeBuilder::new("userid", AttributeType::String)
                .required()
                .build(),
            AttributeBuilder::new("iamid", AttributeType::String)
                .required()
                .build(),
            AttributeBuilder::new("profile", AttributeType::Number)
                .description("Id of the user profile")
                .optional()
                .computed()
                .build(),
        ]);

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages the members of an Immuta group")
            .attribute(
                AttributeBuilder::new("id", AttributeType::Number)
                    .description("Id of the group")
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(AttributeBuilder::nested("users", member).required().build())
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];

        if let Ok(Some(users)) = request.config.get_optional_list(&AttributePath::new("users")) {
            if users.is_empty() {
                diagnostics.push(
                    Diagnostic::error("No users", "At least one user is required")
                        .with_attribute(AttributePath::new("users")),
                );
            }
        }

        ValidateResourceConfigResponse { diagnostics }
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

        let mut planned = match members(&new_state) {
            Ok(planned) => planned,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                };
            }
        };

        let Some(group_id) = planned.first().map(|m| m.group) else {
            diagnostics.push(Diagnostic::error("No users", "At least one user is required"));
            return CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics,
            };
        };

        if let Err(diag) = require_group(client, group_id).await {
            diagnostics.push(diag);
            return CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics,
            };
        }

        diagnostics.extend(
            planned
                .iter()
                .filter(|m| m.group != group_id)
                .map(|m| wrong_group(m, group_id)),
        );
        if !diagnostics.is_empty() {
            return CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics,
            };
        }

        for member in planned.iter_mut() {
            if let Err(diag) = add_member(client, member).await {
                diagnostics.push(diag);
                break;
            }
        }

        if let Err(e) = set_members(&mut new_state, group_id, &planned) {
            diagnostics.push(state_error(e));
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

        let Ok(group_id) = request.current_state.get_number(&AttributePath::new("id")) else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: request.private,
            };
        };
        let group_id = group_id as i64;

        match client.bim().groups().exists(group_id).await {
            Ok(true) => {}
            Ok(false) => {
                diagnostics.push(Diagnostic::error(
                    "Group not found",
                    format!("Group {} does not exist", group_id),
                ));
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
        }

        let listed = match client.bim().group_users(group_id).list().await {
            Ok(listed) => listed,
            Err(e) => {
                diagnostics.push(api_error("Failed to list group members", &e));
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                };
            }
        };

        let current: Vec<Member> = listed.hits.iter().map(Member::from_api).collect();
        diagnostics.extend(
            current
                .iter()
                .filter(|m| m.group != group_id)
                .map(|m| wrong_group(m, group_id)),
        );
        if !diagnostics.is_empty() {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics,
                private: request.private,
            };
        }

        let mut new_state = request.current_state.clone();
        if let Err(e) = set_members(&mut new_state, group_id, &current) {
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

        let (Ok(group_id), Ok(existing), Ok(mut planned)) = (
            request.prior_state.get_number(&AttributePath::new("id")),
            members(&request.prior_state),
            members(&request.planned_state),
        ) else {
            diagnostics.push(Diagnostic::error(
                "Invalid group membership state",
                "The prior state or the plan could not be decoded",
            ));
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics,
            };
        };
        let group_id = group_id as i64;

        let existing_by_userid: HashMap<&str, &Member> =
            existing.iter().map(|m| (m.userid.as_str(), m)).collect();
        let planned_userids: HashSet<String> = planned.iter().map(|m| m.userid.clone()).collect();

        for member in &planned {
            match existing_by_userid.get(member.userid.as_str()) {
                Some(old) if old.group != member.group || old.iamid != member.iamid => {
                    diagnostics.push(Diagnostic::error(
                        "Cannot move a member",
                        format!(
                            "User '{}' cannot change group or identity manager in place",
                            member.userid
                        ),
                    ));
                }
                Some(_) => {}
                None if member.group != group_id => diagnostics.push(wrong_group(member, group_id)),
                None => {}
            }
        }
        if !diagnostics.is_empty() {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics,
            };
        }

        for old in existing.iter().filter(|m| !planned_userids.contains(&m.userid)) {
            let Some(membership_id) = old.id else {
                continue;
            };
            if let Err(e) = client.bim().group_users(group_id).remove(membership_id).await {
                if !e.is_not_found() {
                    diagnostics.push(api_error(
                        format!("Failed to remove user '{}'", old.userid),
                        &e,
                    ));
                }
            }
        }

        for member in planned.iter_mut() {
            match existing_by_userid.get(member.userid.as_str()) {
                Some(old) => {
                    member.id = old.id;
                    member.profile = member.profile.or(old.profile);
                }
                None => {
                    if let Err(diag) = add_member(client, member).await {
                        diagnostics.push(diag);
                    }
                }
            }
        }

        let mut new_state = request.planned_state;
        if let Err(e) = set_members(&mut new_state, group_id, &planned) {
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

        let existing = match members(&request.prior_state) {
            Ok(existing) => existing,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        for member in &existing {
            let Some(membership_id) = member.id else {
                continue;
            };
            match client
                .bim()
                .group_users(member.group)
                .remove(membership_id)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => diagnostics.push(api_error(
                    format!("Failed to remove user '{}'", member.userid),
                    &e,
                )),
            }
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for GroupUsersResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_provider_data(request, &mut self.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for GroupUsersResource {
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
