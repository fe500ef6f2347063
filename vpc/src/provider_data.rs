//! Provider data handed to resources and data sources in `configure`

use std::sync::Arc;

use crate::api::Client;
use crate::locks::LockRegistry;
use crate::wait::PollConfig;

#[derive(Clone)]
pub struct VpcProviderData {
    pub client: Arc<Client>,
    pub locks: Arc<LockRegistry>,
    pub poll: PollConfig,
}

impl VpcProviderData {
    pub fn new(client: Client) -> Self {
        Self::with_poll(client, PollConfig::default())
    }

    pub fn with_poll(client: Client, poll: PollConfig) -> Self {
        Self {
            client: Arc::new(client),
            locks: Arc::new(LockRegistry::new()),
            poll,
        }
    }
}
