//! Data source registration resources

pub mod resource_data_source;

pub use resource_data_source::DataSourceResource;
