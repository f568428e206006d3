use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::{MemoryStore, Store};
use crate::events::EventHub;

/// Shared handles passed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub events: EventHub,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Self {
        let events = EventHub::new(config.server.event_buffer);
        Self {
            config: Arc::new(config),
            store,
            events,
        }
    }

    /// Development configuration over a fresh in-memory store
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }
}
