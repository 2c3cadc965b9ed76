use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::error::ImportError;
use crate::engine::event::{EngineEvent, EventKind, EventRing};
use crate::engine::intent::{has_autoplay_marker, marker_category, IntentKind, NavigationIntent};
use crate::engine::state::{CategoryCount, EngineStatus, PersistedState};
use crate::engine::transfer::{parse_import, ListsExport};
use crate::playlist::{
    build_master, canonicalize, content_token, parse_lines, Category, CategoryLists, EpisodeEntry, SequenceIndex,
};
use crate::store::{StateStore, STATE_KEY};
use crate::webhook::Notification;

/// Owner of the persisted playlist state and its lookup index.
///
/// One engine is shared by every page session; callers serialize access
/// (the runtime keeps it behind a `tokio::sync::Mutex`).
pub struct Engine {
    instance_id: String,
    config: EngineConfig,
    store: Arc<dyn StateStore>,
    state: PersistedState,
    index: SequenceIndex,
    events: EventRing,
    notification_tx: Option<UnboundedSender<Notification>>,
}

impl Engine {
    /// Load the persisted record and rebuild the sequence from its lists.
    ///
    /// A missing, unreadable or corrupt record yields a fresh state, which
    /// the rebuild writes back immediately.
    pub fn load(store: Arc<dyn StateStore>, config: EngineConfig) -> Self {
        let state = match store.get(STATE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<PersistedState>(&raw) {
                Ok(state) => state,
                Err(e) => {
                    warn!(error = %e, "Persisted state is corrupt, starting fresh");
                    PersistedState::default()
                }
            },
            Ok(None) => {
                info!("No persisted state found, initializing");
                PersistedState::default()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read persisted state, starting fresh");
                PersistedState::default()
            }
        };

        let mut engine = Self {
            instance_id: Uuid::new_v4().to_string(),
            events: EventRing::new(config.event_limit),
            config,
            store,
            state,
            index: SequenceIndex::default(),
            notification_tx: None,
        };
        engine.rebuild();
        engine
    }

    pub fn with_notification_tx(mut self, tx: UnboundedSender<Notification>) -> Self {
        self.notification_tx = Some(tx);
        self
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    pub fn lists(&self) -> &CategoryLists {
        &self.state.lists
    }

    pub fn master(&self) -> &[EpisodeEntry] {
        &self.state.master
    }

    pub fn index(&self) -> &SequenceIndex {
        &self.index
    }

    pub fn position(&self) -> Option<usize> {
        self.state.position()
    }

    pub fn current_entry(&self) -> Option<&EpisodeEntry> {
        self.state.current()
    }

    /// Rebuild the master sequence and index from the current lists.
    ///
    /// Re-clamps the position into the new sequence and persists.
    pub fn rebuild(&mut self) {
        let master = build_master(&self.state.lists);
        self.index = SequenceIndex::build(&master);
        self.state.i = match master.len() {
            0 => 0,
            len => self.state.i.min(len - 1),
        };
        self.state.master = master;
        self.persist();

        debug!(
            entries = self.state.master.len(),
            keys = self.index.key_count(),
            position = self.state.i,
            "Sequence rebuilt"
        );
        self.record(EngineEvent::new(
            EventKind::ListsRebuilt,
            format!(
                "{} entries from {} lines",
                self.state.master.len(),
                self.state.lists.line_count()
            ),
        ));
    }

    /// Replace the category lists, rebuild and, when a page location is
    /// known, re-resolve the position against it.
    pub fn set_lists(&mut self, lists: CategoryLists, location: Option<&str>) {
        self.state.lists = lists;
        self.rebuild();
        if let Some(location) = location {
            self.resolve_current_position(location, None);
        }
    }

    /// Point the tracked position at the entry `location` refers to.
    ///
    /// Returns the matched position; an unrecognized location leaves the
    /// position untouched and returns `None`.
    pub fn resolve_current_position(
        &mut self,
        location: &str,
        page_id: Option<Uuid>,
    ) -> Option<usize> {
        let found = self.index.lookup(location)?;
        if self.state.i != found.position {
            let previous = self.state.i;
            self.state.i = found.position;
            self.persist();
            info!(
                from = previous,
                to = found.position,
                kind = ?found.kind,
                "Position resolved from location"
            );
            self.record(
                EngineEvent::new(
                    EventKind::PositionResolved,
                    format!("{previous} -> {} ({:?} match)", found.position, found.kind),
                )
                .with_page(page_id)
                .with_position(found.position),
            );
        }
        Some(found.position)
    }

    /// `location` is the page of the entry at the tracked position, by
    /// canonical key or, failing that, by content token.
    pub fn is_on_current_listed_page(&self, location: &str) -> bool {
        let Some(entry) = self.current_entry() else {
            return false;
        };
        if canonicalize(location) == canonicalize(&entry.url) {
            return true;
        }
        match (content_token(location), content_token(&entry.url)) {
            (Some(here), Some(listed)) => here == listed,
            _ => false,
        }
    }

    /// Listed page or a page reached through an engine navigation.
    pub fn is_active_for(&self, location: &str) -> bool {
        self.is_on_current_listed_page(location) || has_autoplay_marker(location)
    }

    /// Category for the page: the `wwe_type` marker, else the tracked entry's.
    pub fn page_category(&self, location: &str) -> Option<Category> {
        marker_category(location).or_else(|| self.current_entry().map(|e| e.category))
    }

    pub fn start_from_first(&mut self, page_id: Option<Uuid>) -> Option<NavigationIntent> {
        if self.state.master.is_empty() {
            return None;
        }
        self.state.i = 0;
        self.persist();
        self.navigation_to(0, IntentKind::Start, page_id)
    }

    pub fn resume_from_current(&mut self, page_id: Option<Uuid>) -> Option<NavigationIntent> {
        let position = self.position()?;
        self.state.i = position;
        self.persist();
        self.navigation_to(position, IntentKind::Resume, page_id)
    }

    /// Step to the next entry, saturating at the last one.
    pub fn advance(&mut self, page_id: Option<Uuid>) -> Option<NavigationIntent> {
        let previous = self.position()?;
        let next = (previous + 1).min(self.state.master.len() - 1);
        self.state.i = next;
        self.persist();

        info!(from = previous, to = next, "Advancing");
        self.record(
            EngineEvent::new(EventKind::Advanced, format!("{previous} -> {next}"))
                .with_page(page_id)
                .with_position(next),
        );
        self.navigation_to(next, IntentKind::Continue, page_id)
    }

    fn navigation_to(
        &mut self,
        position: usize,
        kind: IntentKind,
        page_id: Option<Uuid>,
    ) -> Option<NavigationIntent> {
        let entry = self.state.master.get(position)?;
        let Some(intent) = NavigationIntent::for_entry(entry, position, kind) else {
            warn!(url = %entry.url, "Entry URL cannot be navigated to");
            return None;
        };
        self.record(
            EngineEvent::new(EventKind::NavigationRequested, intent.target.clone())
                .with_page(page_id)
                .with_position(position),
        );
        Some(intent)
    }

    pub fn export_lists(&self) -> ListsExport {
        self.export_lists_at(Utc::now())
    }

    pub fn export_lists_at(&self, at: DateTime<Utc>) -> ListsExport {
        ListsExport::new(&self.state.lists, at)
    }

    /// Apply an exported lists payload. A rejected payload changes nothing.
    ///
    /// Returns the new sequence length.
    pub fn import_lists(
        &mut self,
        payload: &str,
        location: Option<&str>,
    ) -> Result<usize, ImportError> {
        let lists = match parse_import(payload) {
            Ok(lists) => lists,
            Err(e) => {
                warn!(error = %e, "Import rejected");
                self.record(EngineEvent::new(EventKind::ImportRejected, e.to_string()));
                return Err(e);
            }
        };
        self.set_lists(lists, location);
        let len = self.state.master.len();
        info!(entries = len, "Lists imported");
        self.record(EngineEvent::new(
            EventKind::ImportApplied,
            format!("{len} entries"),
        ));
        Ok(len)
    }

    pub fn status(&self) -> EngineStatus {
        let position = self.position();
        let next = position.and_then(|i| self.state.master.get(i + 1)).cloned();
        let lines = Category::ALL
            .into_iter()
            .map(|category| {
                let lines = self.state.lists.get(category);
                CategoryCount {
                    category,
                    lines: lines.len(),
                    episodes: parse_lines(lines, category).len(),
                }
            })
            .collect();
        EngineStatus {
            sequence_length: self.state.master.len(),
            position,
            current: self.current_entry().cloned(),
            next,
            lines,
        }
    }

    /// Recent events, newest first.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.list()
    }

    pub fn event_count(&self, kind: EventKind) -> usize {
        self.events.count(kind)
    }

    /// Keep an event in the ring and forward it to the notification channel.
    pub fn record(&mut self, event: EngineEvent) {
        if let Some(tx) = &self.notification_tx {
            let _ = tx.send(Notification {
                instance_id: self.instance_id.clone(),
                event: event.clone(),
            });
        }
        self.events.push(event);
    }

    fn persist(&self) {
        let raw = match serde_json::to_string(&self.state) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to serialize state");
                return;
            }
        };
        if let Err(e) = self.store.set(STATE_KEY, &raw) {
            warn!(error = %e, "Failed to persist state");
        }
    }
}
