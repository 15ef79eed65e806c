//! REST client for the Immuta API

pub mod bim;
pub mod client;
pub mod common;
pub mod data_sources;
pub mod error;
pub mod projects;
pub mod purposes;
pub mod tags;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use client::Client;
pub use common::{ApiQueryParams, NamedRef, SearchResponse};
pub use error::ApiError;
