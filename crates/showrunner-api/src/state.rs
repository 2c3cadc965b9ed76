use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use showrunner_core::{
    Engine, EngineConfig, MemoryStore, PageRuntime, ReportedPlayer, SharedEngine,
};

use crate::host::CommandQueue;

/// One open page: its runtime plus the two halves of the shim bridge.
#[derive(Clone)]
pub struct PageEntry {
    pub runtime: Arc<PageRuntime>,
    pub player: Arc<ReportedPlayer>,
    pub commands: Arc<CommandQueue>,
    pub opened_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: SharedEngine,
    pub pages: Arc<DashMap<Uuid, PageEntry>>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(tokio::sync::Mutex::new(engine)),
            pages: Arc::new(DashMap::new()),
            started_at: Utc::now(),
        }
    }

    /// Engine over an ephemeral store with default settings.
    pub fn in_memory() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::new(Engine::load(Arc::new(MemoryStore::new()), config))
    }

    pub fn page(&self, id: &Uuid) -> Option<PageEntry> {
        self.pages.get(id).map(|entry| entry.value().clone())
    }

    /// Snapshot of every page entry, so no map guard is held across awaits.
    pub fn page_entries(&self) -> Vec<(Uuid, PageEntry)> {
        self.pages
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }
}
