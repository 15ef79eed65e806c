//! Governance resources: projects, purposes and tags

pub mod resource_project;
pub mod resource_purpose;
pub mod resource_tag;

pub use resource_project::ProjectResource;
pub use resource_purpose::PurposeResource;
pub use resource_tag::TagResource;
