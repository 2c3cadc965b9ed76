use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

use crate::playlist::{Category, CategoryLists, EpisodeEntry};

/// The single durable record: `{raw, sd, ppv, heat, master, i}`.
///
/// Older or hand-edited records may carry extra fields, miss fields, or hold
/// a `master`/`i` of the wrong shape. Those parts default rather than
/// failing the load, since `master` is rebuilt from the lists anyway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(flatten)]
    pub lists: CategoryLists,
    #[serde(default, deserialize_with = "lenient")]
    pub master: Vec<EpisodeEntry>,
    #[serde(default, deserialize_with = "lenient")]
    pub i: usize,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

impl PersistedState {
    /// Tracked position, or `None` while the sequence is empty.
    pub fn position(&self) -> Option<usize> {
        (!self.master.is_empty()).then(|| self.i.min(self.master.len() - 1))
    }

    pub fn current(&self) -> Option<&EpisodeEntry> {
        self.position().and_then(|i| self.master.get(i))
    }
}

/// Read-only summary of the engine, for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub sequence_length: usize,
    pub position: Option<usize>,
    pub current: Option<EpisodeEntry>,
    pub next: Option<EpisodeEntry>,
    pub lines: Vec<CategoryCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub lines: usize,
    pub episodes: usize,
}
