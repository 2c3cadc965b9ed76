#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod player;
pub mod playlist;
pub mod runtime;
pub mod store;
pub mod webhook;

pub use config::EngineConfig;
pub use engine::{
    Effect, Engine, EngineEvent, EngineStatus, EventKind, ImportError, IntentKind, ListsExport,
    NavigationIntent, PageSession, PersistedState, PlayerEvent,
};
pub use player::{PlayerHandle, PlayerLocator, ReportedPlayer};
pub use playlist::{canonicalize, content_token, Category, CategoryLists, EpisodeEntry};
pub use runtime::{PageHost, PageRuntime, PageSnapshot, SharedEngine, TimerSlot};
pub use store::{FileStore, MemoryStore, StateStore, StoreError, STATE_KEY};
pub use webhook::{
    build_client, notification_channel, DeliveryError, Notification, WebhookConfig,
    WebhookDispatcher, WebhookPayload,
};
