//! Provider data handed to every resource through `configure`

use crate::api::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct ImmutaProviderData {
    pub client: Arc<Client>,
}

impl ImmutaProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}
