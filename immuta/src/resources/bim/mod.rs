//! Identity management resources

pub mod resource_attribute;
pub mod resource_group;
pub mod resource_group_users;
pub mod resource_user;

pub use resource_attribute::AttributeResource;
pub use resource_group::GroupResource;
pub use resource_group_users::GroupUsersResource;
pub use resource_user::UserResource;
