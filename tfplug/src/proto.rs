//! Generated protocol buffer types for Terraform Plugin Protocol 6
//!
//! The code is produced by `tonic-build` from `proto/tfplugin6.proto` at build
//! time. Several generated names collide with framework types (`DynamicValue`,
//! `Diagnostic`, `AttributePath`, `Schema`), so refer to these through the
//! `proto::` prefix.

#![allow(clippy::large_enum_variant, clippy::enum_variant_names)]

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

pub use provider_server::{Provider as ProviderService, ProviderServer};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_types_accessible() {
        let _ = diagnostic::Severity::Error;
        let _ = attribute_path::step::Selector::AttributeName("name".to_string());
        let _ = schema::object::NestingMode::Single;
        let _ = plan_resource_change::Response::default();
        let _ = import_resource_state::ImportedResource::default();
    }
}
