//! Timer-driven runtime for one page view.
//!
//! [`PageRuntime`] owns the two watchers of a page (autoplay retry and
//! end/progress) plus the pending navigation, each in its own
//! [`TimerSlot`]. Ticks lock the shared engine first and the page session
//! second, run a [`PageSession`] transition and carry out the returned
//! effects after both locks are released.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::{ConfirmationPhase, Effect, Engine, PageSession, PlayerEvent};
use crate::player::PlayerLocator;
use crate::playlist::Category;

/// Engine shared by every page runtime.
pub type SharedEngine = Arc<tokio::sync::Mutex<Engine>>;

/// The page the engine is driving: navigation and play requests.
#[async_trait]
pub trait PageHost: Send + Sync {
    async fn navigate(&self, url: &str);
    async fn request_play(&self);
}

/// Holds at most one running timer task. Starting a new one aborts the old.
#[derive(Debug, Default)]
pub struct TimerSlot {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn replace(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn cancel(&self) {
        if let Some(handle) = self.lock().take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Read-only view of a page, for the API and logs.
#[derive(Debug, Clone, Serialize)]
pub struct PageSnapshot {
    pub id: Uuid,
    pub location: String,
    pub active: bool,
    pub on_listed_page: bool,
    pub category: Option<Category>,
    pub confirmation: ConfirmationPhase,
    pub watched_secs: f64,
    pub user_paused: bool,
    pub advancing: bool,
    pub autoplay_attempts: u32,
    pub autoplay_running: bool,
    pub watch_running: bool,
}

struct Inner {
    id: Uuid,
    engine: SharedEngine,
    session: Mutex<PageSession>,
    locator: Arc<dyn PlayerLocator>,
    host: Arc<dyn PageHost>,
    watch_interval: Duration,
    autoplay_interval: Duration,
    autoplay_start_delay: Duration,
    navigate_delay: Duration,
    watch: TimerSlot,
    autoplay: TimerSlot,
    navigation: TimerSlot,
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, PageSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Live page view bound to the shared engine.
///
/// Dropping the runtime (or calling [`PageRuntime::close`]) stops its timers.
pub struct PageRuntime {
    inner: Arc<Inner>,
}

impl PageRuntime {
    /// Attach to a freshly loaded page and start its watchers.
    pub async fn open(
        engine: SharedEngine,
        locator: Arc<dyn PlayerLocator>,
        host: Arc<dyn PageHost>,
        location: impl Into<String>,
    ) -> Self {
        let mut session = PageSession::new(location);
        let (effects, config) = {
            let mut guard = engine.lock().await;
            (session.attach(&mut guard), guard.config().clone())
        };
        info!(page_id = %session.id, location = %session.location, "Page opened");

        let inner = Arc::new(Inner {
            id: session.id,
            engine,
            session: Mutex::new(session),
            locator,
            host,
            watch_interval: config.watch_interval,
            autoplay_interval: config.autoplay_interval,
            autoplay_start_delay: config.autoplay_start_delay,
            navigate_delay: config.navigate_delay,
            watch: TimerSlot::new(),
            autoplay: TimerSlot::new(),
            navigation: TimerSlot::new(),
        });
        apply(&inner, effects).await;
        Self { inner }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn location(&self) -> String {
        self.inner.session().location.clone()
    }

    /// Client-side navigation to `location`: page state starts over.
    pub async fn route_changed(&self, location: &str) {
        let effects = {
            let mut engine = self.inner.engine.lock().await;
            self.inner.session().on_route_change(&mut engine, location)
        };
        debug!(page_id = %self.inner.id, location, "Route changed");
        apply(&self.inner, effects).await;
    }

    pub async fn player_event(&self, event: PlayerEvent) {
        let player = self.inner.locator.locate();
        let now = Instant::now().into_std();
        let effects = {
            let mut engine = self.inner.engine.lock().await;
            self.inner
                .session()
                .on_player_event(&mut engine, event, player, now)
        };
        apply(&self.inner, effects).await;
    }

    pub async fn start_from_first(&self) -> bool {
        let effects = {
            let mut engine = self.inner.engine.lock().await;
            self.inner.session().start_from_first(&mut engine)
        };
        let navigating = !effects.is_empty();
        apply(&self.inner, effects).await;
        navigating
    }

    pub async fn resume_from_current(&self) -> bool {
        let effects = {
            let mut engine = self.inner.engine.lock().await;
            self.inner.session().resume_from_current(&mut engine)
        };
        let navigating = !effects.is_empty();
        apply(&self.inner, effects).await;
        navigating
    }

    pub async fn snapshot(&self) -> PageSnapshot {
        let engine = self.inner.engine.lock().await;
        let session = self.inner.session();
        PageSnapshot {
            id: session.id,
            location: session.location.clone(),
            active: engine.is_active_for(&session.location),
            on_listed_page: engine.is_on_current_listed_page(&session.location),
            category: engine.page_category(&session.location),
            confirmation: session.confirmation.phase,
            watched_secs: session.confirmation.accumulated_secs,
            user_paused: session.user_paused,
            advancing: session.advancing,
            autoplay_attempts: session.autoplay_attempts,
            autoplay_running: self.inner.autoplay.is_running(),
            watch_running: self.inner.watch.is_running(),
        }
    }

    pub fn close(&self) {
        self.inner.watch.cancel();
        self.inner.autoplay.cancel();
        self.inner.navigation.cancel();
        info!(page_id = %self.inner.id, "Page closed");
    }
}

async fn apply(inner: &Arc<Inner>, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::ScheduleAutoplay => {
                let weak = Arc::downgrade(inner);
                let delay = inner.autoplay_start_delay;
                inner
                    .autoplay
                    .replace(tokio::spawn(run_autoplay(weak, delay)));
            }
            Effect::RestartWatch => {
                let weak = Arc::downgrade(inner);
                inner.watch.replace(tokio::spawn(run_watch(weak)));
            }
            other => perform(inner, other).await,
        }
    }
}

/// Effects a watcher tick can produce. Ticks never (re)start a watcher.
async fn perform(inner: &Arc<Inner>, effect: Effect) {
    match effect {
        Effect::RequestPlay => inner.host.request_play().await,
        Effect::Navigate(intent) => {
            debug!(page_id = %inner.id, target = %intent.target, "Navigation scheduled");
            let weak = Arc::downgrade(inner);
            let delay = inner.navigate_delay;
            inner.navigation.replace(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(inner) = weak.upgrade() {
                    inner.host.navigate(&intent.target).await;
                }
            }));
        }
        Effect::CancelAutoplay => inner.autoplay.cancel(),
        Effect::ScheduleAutoplay | Effect::RestartWatch => {
            debug!(page_id = %inner.id, ?effect, "Watcher restart outside a page event ignored");
        }
    }
}

async fn run_autoplay(weak: Weak<Inner>, delay: Duration) {
    tokio::time::sleep(delay).await;
    let period = {
        let Some(inner) = weak.upgrade() else { return };
        if !inner.session().begin_autoplay() {
            return;
        }
        inner.autoplay_interval
    };

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = weak.upgrade() else { break };
        let player = inner.locator.locate();
        let effects = {
            let mut engine = inner.engine.lock().await;
            inner.session().autoplay_tick(&mut engine, player)
        };
        if effects.contains(&Effect::CancelAutoplay) {
            break;
        }
        for effect in effects {
            perform(&inner, effect).await;
        }
    }
}

async fn run_watch(weak: Weak<Inner>) {
    let Some(period) = weak.upgrade().map(|inner| inner.watch_interval) else {
        return;
    };
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = weak.upgrade() else { break };
        let player = inner.locator.locate();
        let effects = {
            let mut engine = inner.engine.lock().await;
            inner.session().watch_tick(&mut engine, player)
        };
        for effect in effects {
            perform(&inner, effect).await;
        }
    }
}
