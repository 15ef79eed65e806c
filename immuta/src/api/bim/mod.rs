//! BIM (identity management) endpoints

pub mod attributes;
pub mod group_users;
pub mod groups;
pub mod users;

use crate::api::Client;

/// BIM API providing user, group and authorization operations
pub struct BimApi<'a> {
    client: &'a Client,
}

impl<'a> BimApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn users(&self) -> users::UsersApi<'a> {
        users::UsersApi::new(self.client)
    }

    pub fn groups(&self) -> groups::GroupsApi<'a> {
        groups::GroupsApi::new(self.client)
    }

    /// Memberships of one group
    pub fn group_users(&self, group_id: i64) -> group_users::GroupUsersApi<'a> {
        group_users::GroupUsersApi::new(self.client, group_id)
    }

    pub fn attributes(&self) -> attributes::AttributesApi<'a> {
        attributes::AttributesApi::new(self.client)
    }
}
