//! Per-page watcher logic as plain transitions.
//!
//! Every handler takes the current inputs, mutates the session (and the
//! shared engine where persistence is involved) and returns the timer or
//! host [`Effect`]s the caller has to carry out. Nothing here sleeps or
//! spawns, so the whole state machine runs under a test without timers.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::confirm::ConfirmationState;
use crate::engine::event::{EngineEvent, EventKind};
use crate::engine::intent::{has_autoplay_marker, NavigationIntent};
use crate::engine::sequencer::Engine;
use crate::player::PlayerHandle;

/// Work requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Ask the page to start the player.
    RequestPlay,
    /// Navigate after the settle delay.
    Navigate(NavigationIntent),
    CancelAutoplay,
    /// Start the autoplay watcher after its start delay.
    ScheduleAutoplay,
    /// Restart the end/progress watcher from scratch.
    RestartWatch,
}

/// Native player notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerEvent {
    Playing,
    Pause,
    Ended,
    TimeUpdate,
}

#[derive(Debug, Clone)]
pub struct PageSession {
    pub id: Uuid,
    pub location: String,
    pub user_paused: bool,
    pub pause_guard_until: Option<Instant>,
    /// Latched while a completion is being acted on.
    pub advancing: bool,
    pub confirmation: ConfirmationState,
    pub autoplay_attempts: u32,
}

impl PageSession {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            location: location.into(),
            user_paused: false,
            pause_guard_until: None,
            advancing: false,
            confirmation: ConfirmationState::default(),
            autoplay_attempts: 0,
        }
    }

    /// First setup of a freshly loaded page.
    pub fn attach(&mut self, engine: &mut Engine) -> Vec<Effect> {
        self.enter(engine)
    }

    /// The page shell moved to `location` without a full reload.
    pub fn on_route_change(&mut self, engine: &mut Engine, location: &str) -> Vec<Effect> {
        self.location = location.to_string();
        self.enter(engine)
    }

    fn enter(&mut self, engine: &mut Engine) -> Vec<Effect> {
        self.advancing = false;
        engine.resolve_current_position(&self.location, Some(self.id));
        self.confirmation.reset();

        let mut effects = Vec::with_capacity(2);
        if !self.user_paused {
            effects.push(Effect::ScheduleAutoplay);
        }
        effects.push(Effect::RestartWatch);
        effects
    }

    /// Called when the autoplay start delay elapses. Returns whether the
    /// retry watcher should run for this page.
    pub fn begin_autoplay(&mut self) -> bool {
        if self.user_paused || !has_autoplay_marker(&self.location) {
            return false;
        }
        self.autoplay_attempts = 0;
        true
    }

    /// One autoplay retry. A `CancelAutoplay` effect ends the watcher.
    pub fn autoplay_tick(
        &mut self,
        engine: &mut Engine,
        player: Option<PlayerHandle>,
    ) -> Vec<Effect> {
        if self.user_paused {
            return vec![Effect::CancelAutoplay];
        }
        self.autoplay_attempts += 1;
        if self.autoplay_attempts > engine.config().autoplay_max_attempts {
            debug!(page_id = %self.id, "Autoplay attempts exhausted");
            engine.record(
                EngineEvent::new(
                    EventKind::AutoplayExhausted,
                    format!("no playback after {} attempts", self.autoplay_attempts - 1),
                )
                .with_page(Some(self.id)),
            );
            return vec![Effect::CancelAutoplay];
        }
        match player {
            Some(p) if p.paused => vec![Effect::RequestPlay],
            Some(_) => vec![Effect::CancelAutoplay],
            None => Vec::new(),
        }
    }

    /// Periodic end/progress check.
    pub fn watch_tick(&mut self, engine: &mut Engine, player: Option<PlayerHandle>) -> Vec<Effect> {
        if self.advancing || self.user_paused {
            return Vec::new();
        }
        let Some(player) = player else {
            return Vec::new();
        };

        self.observe(engine, &player);

        if !self.confirmation.is_confirmed() || !engine.is_on_current_listed_page(&self.location) {
            return Vec::new();
        }
        if player.ended || player.near_end(engine.config().end_epsilon) {
            return self.begin_advance(engine);
        }
        Vec::new()
    }

    pub fn on_player_event(
        &mut self,
        engine: &mut Engine,
        event: PlayerEvent,
        player: Option<PlayerHandle>,
        now: Instant,
    ) -> Vec<Effect> {
        match event {
            PlayerEvent::Playing => self.on_playing(),
            PlayerEvent::Pause => {
                let ended = player.is_some_and(|p| p.ended);
                self.on_pause(engine, ended, now)
            }
            PlayerEvent::Ended => self.on_ended(engine, now),
            PlayerEvent::TimeUpdate => {
                if let Some(p) = player {
                    self.on_progress(engine, &p);
                }
                Vec::new()
            }
        }
    }

    /// A genuine play clears any user pause and starts a fresh confirmation.
    pub fn on_playing(&mut self) -> Vec<Effect> {
        self.user_paused = false;
        self.pause_guard_until = None;
        self.confirmation.reset();
        vec![Effect::RestartWatch]
    }

    /// A pause that is not the end of the media is taken as a user pause.
    pub fn on_pause(&mut self, engine: &mut Engine, ended: bool, now: Instant) -> Vec<Effect> {
        if ended {
            return Vec::new();
        }
        self.user_paused = true;
        self.pause_guard_until = Some(now + engine.config().pause_guard);
        engine.record(
            EngineEvent::new(EventKind::UserPaused, self.location.clone()).with_page(Some(self.id)),
        );
        vec![Effect::CancelAutoplay]
    }

    pub fn on_ended(&mut self, engine: &mut Engine, now: Instant) -> Vec<Effect> {
        if self.pause_guard_until.is_some_and(|until| now < until) {
            debug!(page_id = %self.id, "Ignoring ended inside pause guard");
            return Vec::new();
        }
        if !self.confirmation.is_confirmed() || !engine.is_on_current_listed_page(&self.location) {
            return Vec::new();
        }
        self.begin_advance(engine)
    }

    pub fn on_progress(&mut self, engine: &mut Engine, player: &PlayerHandle) {
        if !self.user_paused {
            self.observe(engine, player);
        }
    }

    pub fn start_from_first(&mut self, engine: &mut Engine) -> Vec<Effect> {
        self.clear_flags();
        let intent = engine.start_from_first(Some(self.id));
        navigate_effects(intent)
    }

    pub fn resume_from_current(&mut self, engine: &mut Engine) -> Vec<Effect> {
        self.clear_flags();
        let intent = engine.resume_from_current(Some(self.id));
        navigate_effects(intent)
    }

    fn observe(&mut self, engine: &mut Engine, player: &PlayerHandle) {
        if self.confirmation.observe(player, engine.config()) {
            info!(
                page_id = %self.id,
                watched_secs = self.confirmation.accumulated_secs,
                "Main playback confirmed"
            );
            let mut event = EngineEvent::new(EventKind::PlaybackConfirmed, self.location.clone())
                .with_page(Some(self.id));
            if let Some(position) = engine.position() {
                event = event.with_position(position);
            }
            engine.record(event);
        }
    }

    fn begin_advance(&mut self, engine: &mut Engine) -> Vec<Effect> {
        if self.advancing {
            return Vec::new();
        }
        self.advancing = true;
        self.user_paused = false;
        self.pause_guard_until = None;
        match engine.advance(Some(self.id)) {
            Some(intent) => navigate_effects(Some(intent)),
            None => {
                self.advancing = false;
                Vec::new()
            }
        }
    }

    fn clear_flags(&mut self) {
        self.user_paused = false;
        self.pause_guard_until = None;
        self.advancing = false;
    }
}

fn navigate_effects(intent: Option<NavigationIntent>) -> Vec<Effect> {
    match intent {
        Some(intent) => vec![Effect::CancelAutoplay, Effect::Navigate(intent)],
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::EngineConfig;
    use crate::playlist::CategoryLists;
    use crate::store::MemoryStore;

    const FIRST: &str = "https://www.netflix.com/watch/80000001";
    const SECOND: &str = "https://www.netflix.com/watch/80000002";

    fn engine() -> Engine {
        let mut engine = Engine::load(Arc::new(MemoryStore::new()), EngineConfig::default());
        engine.set_lists(
            CategoryLists::from_texts(
                &format!("2024-01-01 {FIRST}\n2024-01-08 {SECOND}"),
                "",
                "",
                "",
            ),
            None,
        );
        engine
    }

    fn playing(position: f64) -> PlayerHandle {
        PlayerHandle {
            position,
            duration: Some(1800.0),
            controls_visible: true,
            ..Default::default()
        }
    }

    fn confirm(session: &mut PageSession, engine: &mut Engine) {
        for t in 0..=31 {
            assert!(session.watch_tick(engine, Some(playing(t as f64))).is_empty());
        }
        assert!(session.confirmation.is_confirmed());
    }

    fn navigated_to(effects: &[Effect]) -> Option<usize> {
        effects.iter().find_map(|e| match e {
            Effect::Navigate(intent) => Some(intent.position),
            _ => None,
        })
    }

    #[test]
    fn attach_resolves_and_starts_watchers() {
        let mut engine = engine();
        let mut session = PageSession::new(format!("{SECOND}?trackId=1"));
        let effects = session.attach(&mut engine);
        assert_eq!(effects, vec![Effect::ScheduleAutoplay, Effect::RestartWatch]);
        assert_eq!(engine.position(), Some(1));
    }

    #[test]
    fn near_end_advances_once() {
        let mut engine = engine();
        let mut session = PageSession::new(FIRST);
        session.attach(&mut engine);
        confirm(&mut session, &mut engine);

        let effects = session.watch_tick(&mut engine, Some(playing(1799.8)));
        assert_eq!(navigated_to(&effects), Some(1));
        assert!(session.advancing);
        assert!(session.watch_tick(&mut engine, Some(playing(1799.9))).is_empty());
        assert!(session.on_ended(&mut engine, Instant::now()).is_empty());
        assert_eq!(engine.position(), Some(1));
    }

    #[test]
    fn unconfirmed_end_does_not_advance() {
        let mut engine = engine();
        let mut session = PageSession::new(FIRST);
        session.attach(&mut engine);
        let mut ended = playing(10.0);
        ended.ended = true;
        assert!(session.watch_tick(&mut engine, Some(ended)).is_empty());
        assert!(session.on_ended(&mut engine, Instant::now()).is_empty());
        assert_eq!(engine.position(), Some(0));
    }

    #[test]
    fn token_matched_page_advances() {
        let mut engine = Engine::load(Arc::new(MemoryStore::new()), EngineConfig::default());
        engine.set_lists(
            CategoryLists::from_texts(
                "2024-01-01 https://www.peacocktv.com/watch/ep-one\n\
                 2024-01-08 https://www.peacocktv.com/watch/ep-two",
                "",
                "",
                "",
            ),
            None,
        );
        let mut session = PageSession::new("https://de.peacocktv.com/watch/ep-one");
        session.attach(&mut engine);
        assert_eq!(engine.position(), Some(0));

        confirm(&mut session, &mut engine);
        let effects = session.on_ended(&mut engine, Instant::now());
        assert_eq!(navigated_to(&effects), Some(1));
        assert_eq!(engine.position(), Some(1));
    }

    #[test]
    fn off_list_page_never_advances() {
        let mut engine = engine();
        let mut session = PageSession::new("https://www.netflix.com/browse");
        session.attach(&mut engine);
        for t in 0..=40 {
            session.watch_tick(&mut engine, Some(playing(t as f64)));
        }
        assert!(session.confirmation.is_confirmed());
        let mut ended = playing(1800.0);
        ended.ended = true;
        assert!(session.watch_tick(&mut engine, Some(ended)).is_empty());
    }

    #[test]
    fn user_pause_suppresses_and_guards_ended() {
        let mut engine = engine();
        let mut session = PageSession::new(FIRST);
        session.attach(&mut engine);
        confirm(&mut session, &mut engine);

        let now = Instant::now();
        let effects = session.on_pause(&mut engine, false, now);
        assert_eq!(effects, vec![Effect::CancelAutoplay]);
        assert!(session.user_paused);
        assert!(session.watch_tick(&mut engine, Some(playing(1800.0))).is_empty());
        assert!(session.on_ended(&mut engine, now + Duration::from_secs(3)).is_empty());

        let later = session.on_ended(&mut engine, now + Duration::from_secs(8));
        assert_eq!(navigated_to(&later), Some(1));
        assert!(!session.user_paused);
    }

    #[test]
    fn pause_at_end_is_not_a_user_pause() {
        let mut engine = engine();
        let mut session = PageSession::new(FIRST);
        assert!(session.on_pause(&mut engine, true, Instant::now()).is_empty());
        assert!(!session.user_paused);
    }

    #[test]
    fn playing_clears_pause_and_restarts_confirmation() {
        let mut engine = engine();
        let mut session = PageSession::new(FIRST);
        session.attach(&mut engine);
        confirm(&mut session, &mut engine);
        session.on_pause(&mut engine, false, Instant::now());

        assert_eq!(session.on_playing(), vec![Effect::RestartWatch]);
        assert!(!session.user_paused);
        assert!(session.pause_guard_until.is_none());
        assert!(!session.confirmation.is_confirmed());
    }

    #[test]
    fn progress_is_ignored_while_paused() {
        let mut engine = engine();
        let mut session = PageSession::new(FIRST);
        session.user_paused = true;
        session.on_progress(&mut engine, &playing(60.0));
        assert_eq!(session.confirmation.accumulated_secs, 0.0);
        session.user_paused = false;
        session.on_progress(&mut engine, &playing(60.0));
        assert!(session.confirmation.is_confirmed());
        assert_eq!(engine.event_count(EventKind::PlaybackConfirmed), 1);
    }

    #[test]
    fn route_change_resets_page_state() {
        let mut engine = engine();
        let mut session = PageSession::new(FIRST);
        session.attach(&mut engine);
        confirm(&mut session, &mut engine);
        session.advancing = true;

        let effects = session.on_route_change(&mut engine, SECOND);
        assert_eq!(effects, vec![Effect::ScheduleAutoplay, Effect::RestartWatch]);
        assert!(!session.advancing);
        assert!(!session.confirmation.is_confirmed());
        assert_eq!(engine.position(), Some(1));

        session.user_paused = true;
        let effects = session.on_route_change(&mut engine, FIRST);
        assert_eq!(effects, vec![Effect::RestartWatch]);
    }

    #[test]
    fn autoplay_requires_marker_and_gives_up() {
        let mut engine = engine();
        let mut session = PageSession::new(FIRST);
        assert!(!session.begin_autoplay());

        session.location = format!("{FIRST}?wwe_autoplay=1&wwe_type=RAW");
        assert!(session.begin_autoplay());
        assert!(session.autoplay_tick(&mut engine, None).is_empty());

        let paused = PlayerHandle {
            paused: true,
            ..Default::default()
        };
        for _ in 1..40 {
            assert_eq!(session.autoplay_tick(&mut engine, Some(paused)), vec![Effect::RequestPlay]);
        }
        assert_eq!(session.autoplay_tick(&mut engine, Some(paused)), vec![Effect::CancelAutoplay]);
        assert_eq!(engine.event_count(EventKind::AutoplayExhausted), 1);
    }

    #[test]
    fn autoplay_stops_once_playing_or_paused_by_user() {
        let mut engine = engine();
        let mut session = PageSession::new(format!("{FIRST}?wwe_start=1"));
        assert!(session.begin_autoplay());
        assert_eq!(
            session.autoplay_tick(&mut engine, Some(playing(1.0))),
            vec![Effect::CancelAutoplay]
        );
        session.user_paused = true;
        assert!(!session.begin_autoplay());
        assert_eq!(session.autoplay_tick(&mut engine, None), vec![Effect::CancelAutoplay]);
    }

    #[test]
    fn start_and_resume_clear_flags() {
        let mut engine = engine();
        let mut session = PageSession::new(SECOND);
        session.attach(&mut engine);
        session.user_paused = true;
        session.advancing = true;

        let effects = session.resume_from_current(&mut engine);
        assert_eq!(navigated_to(&effects), Some(1));
        assert!(!session.user_paused && !session.advancing);

        let effects = session.start_from_first(&mut engine);
        assert_eq!(navigated_to(&effects), Some(0));
        assert_eq!(engine.position(), Some(0));
    }

    #[test]
    fn player_events_dispatch() {
        let mut engine = engine();
        let mut session = PageSession::new(FIRST);
        let now = Instant::now();
        let effects = session.on_player_event(&mut engine, PlayerEvent::Pause, Some(playing(5.0)), now);
        assert_eq!(effects, vec![Effect::CancelAutoplay]);
        let effects = session.on_player_event(&mut engine, PlayerEvent::Playing, None, now);
        assert_eq!(effects, vec![Effect::RestartWatch]);
        let ev: PlayerEvent = serde_json::from_str("\"timeupdate\"").unwrap();
        assert_eq!(ev, PlayerEvent::TimeUpdate);
    }
}
