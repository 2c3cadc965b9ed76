mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::path::PathBuf;

use thiserror::Error;

/// Key under which the engine keeps its single persisted record.
pub const STATE_KEY: &str = "wweAlt.state";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid store key {0:?}")]
    InvalidKey(String),
}

/// Trait for the engine's key-value persistence port.
///
/// Calls are synchronous: a position change is persisted before the
/// watcher tick that caused it returns. Implementations must be
/// Send + Sync so one store can back every page session.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
