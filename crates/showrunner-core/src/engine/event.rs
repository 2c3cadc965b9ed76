use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ListsRebuilt,
    PositionResolved,
    PlaybackConfirmed,
    Advanced,
    NavigationRequested,
    ImportApplied,
    ImportRejected,
    AutoplayExhausted,
    UserPaused,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        Self::ListsRebuilt,
        Self::PositionResolved,
        Self::PlaybackConfirmed,
        Self::Advanced,
        Self::NavigationRequested,
        Self::ImportApplied,
        Self::ImportRejected,
        Self::AutoplayExhausted,
        Self::UserPaused,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Stable snake_case name, used for webhook filtering.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListsRebuilt => "lists_rebuilt",
            Self::PositionResolved => "position_resolved",
            Self::PlaybackConfirmed => "playback_confirmed",
            Self::Advanced => "advanced",
            Self::NavigationRequested => "navigation_requested",
            Self::ImportApplied => "import_applied",
            Self::ImportRejected => "import_rejected",
            Self::AutoplayExhausted => "autoplay_exhausted",
            Self::UserPaused => "user_paused",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListsRebuilt => write!(f, "REBUILD"),
            Self::PositionResolved => write!(f, "RESOLVE"),
            Self::PlaybackConfirmed => write!(f, "CONFIRM"),
            Self::Advanced => write!(f, "ADVANCE"),
            Self::NavigationRequested => write!(f, "NAVIGATE"),
            Self::ImportApplied => write!(f, "IMPORT"),
            Self::ImportRejected => write!(f, "IMPORT-REJECT"),
            Self::AutoplayExhausted => write!(f, "AUTOPLAY-GIVEUP"),
            Self::UserPaused => write!(f, "PAUSE"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    pub details: String,
}

impl EngineEvent {
    pub fn new(kind: EventKind, details: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            page_id: None,
            position: None,
            details: details.into(),
        }
    }

    pub fn with_page(mut self, page_id: Option<Uuid>) -> Self {
        self.page_id = page_id;
        self
    }

    pub fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

/// Fixed-capacity circular buffer for recent events. O(1) insert, evicts oldest when full.
#[derive(Debug, Clone)]
pub struct EventRing {
    buffer: VecDeque<EngineEvent>,
    capacity: usize,
}

impl EventRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: EngineEvent) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    pub fn list(&self) -> Vec<EngineEvent> {
        self.buffer.iter().rev().cloned().collect()
    }

    pub fn list_chronological(&self) -> Vec<EngineEvent> {
        self.buffer.iter().cloned().collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.buffer.iter().filter(|e| e.kind == kind).count()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_lists_newest_first() {
        let mut ring = EventRing::new(5);
        ring.push(EngineEvent::new(EventKind::ListsRebuilt, "3 entries"));
        ring.push(EngineEvent::new(EventKind::Advanced, "0 -> 1"));
        let events = ring.list();
        assert_eq!(events[0].kind, EventKind::Advanced);
        assert_eq!(events[1].kind, EventKind::ListsRebuilt);
    }

    #[test]
    fn ring_evicts_oldest() {
        let mut ring = EventRing::new(2);
        ring.push(EngineEvent::new(EventKind::ListsRebuilt, "e1"));
        ring.push(EngineEvent::new(EventKind::PositionResolved, "e2"));
        ring.push(EngineEvent::new(EventKind::Advanced, "e3"));
        assert_eq!(ring.len(), 2);
        let events = ring.list_chronological();
        assert_eq!(events[0].details, "e2");
        assert_eq!(events[1].details, "e3");
        assert_eq!(ring.count(EventKind::ListsRebuilt), 0);
    }

    #[test]
    fn optional_fields_are_omitted() {
        let json = serde_json::to_value(EngineEvent::new(EventKind::UserPaused, "paused")).unwrap();
        assert!(json.get("page_id").is_none());
        assert!(json.get("position").is_none());
        assert_eq!(json["kind"], "user_paused");
    }

    #[test]
    fn kind_display_and_name() {
        assert_eq!(EventKind::Advanced.to_string(), "ADVANCE");
        assert_eq!(EventKind::ImportRejected.as_str(), "import_rejected");
    }
}
