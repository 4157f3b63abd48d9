mod request_id;

use crate::config::AppConfig;
use crate::store::{MemoryStore, MessageStore, SessionStore};
use crate::upstream::UpstreamClient;

use request_id::RequestIdGenerator;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub upstream: UpstreamClient,
    store: MemoryStore,
    request_ids: RequestIdGenerator,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let upstream = UpstreamClient::new(&config.server, &config.upstream);
        Self {
            config,
            upstream,
            store: MemoryStore::new(),
            request_ids: RequestIdGenerator::new(),
        }
    }

    pub fn next_request_seq(&self) -> u64 {
        self.request_ids.next_seq()
    }

    #[must_use]
    pub fn request_uuid(&self, request_seq: u64) -> uuid::Uuid {
        self.request_ids.request_uuid(request_seq)
    }

    #[must_use]
    pub fn sessions(&self) -> &dyn SessionStore {
        &self.store
    }

    #[must_use]
    pub fn messages(&self) -> &dyn MessageStore {
        &self.store
    }
}
