use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the playback engine and its per-page watchers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Media with a known duration below this many seconds is treated as a teaser (default: 100).
    pub min_considered_duration: f64,
    /// Forward playback in seconds required before a page is confirmed (default: 30).
    pub min_elapsed_to_confirm: f64,
    /// Distance in seconds from a known duration that counts as finished (default: 0.3).
    pub end_epsilon: f64,
    /// Cadence of the end/progress watcher.
    pub watch_interval: Duration,
    /// Cadence of the autoplay retry watcher.
    pub autoplay_interval: Duration,
    /// Autoplay gives up after this many ticks.
    pub autoplay_max_attempts: u32,
    /// Delay between page load (or route change) and the first autoplay attempt.
    pub autoplay_start_delay: Duration,
    /// Settle delay between persisting a new position and navigating to it.
    pub navigate_delay: Duration,
    /// After a user pause, a native `ended` inside this window is ignored.
    pub pause_guard: Duration,
    /// Maximum number of engine events to retain (ring buffer capacity).
    pub event_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_considered_duration: 100.0,
            min_elapsed_to_confirm: 30.0,
            end_epsilon: 0.3,
            watch_interval: Duration::from_millis(1000),
            autoplay_interval: Duration::from_millis(700),
            autoplay_max_attempts: 40,
            autoplay_start_delay: Duration::from_millis(400),
            navigate_delay: Duration::from_millis(300),
            pause_guard: Duration::from_millis(7000),
            event_limit: 200,
        }
    }
}

impl EngineConfig {
    pub fn with_min_considered_duration(mut self, secs: f64) -> Self {
        self.min_considered_duration = secs;
        self
    }

    pub fn with_min_elapsed_to_confirm(mut self, secs: f64) -> Self {
        self.min_elapsed_to_confirm = secs;
        self
    }

    pub fn with_end_epsilon(mut self, secs: f64) -> Self {
        self.end_epsilon = secs.max(0.0);
        self
    }

    pub fn with_watch_interval(mut self, ms: u64) -> Self {
        self.watch_interval = Duration::from_millis(ms.max(1));
        self
    }

    pub fn with_autoplay_interval(mut self, ms: u64) -> Self {
        self.autoplay_interval = Duration::from_millis(ms.max(1));
        self
    }

    pub fn with_autoplay_max_attempts(mut self, attempts: u32) -> Self {
        self.autoplay_max_attempts = attempts;
        self
    }

    pub fn with_autoplay_start_delay(mut self, ms: u64) -> Self {
        self.autoplay_start_delay = Duration::from_millis(ms);
        self
    }

    pub fn with_navigate_delay(mut self, ms: u64) -> Self {
        self.navigate_delay = Duration::from_millis(ms);
        self
    }

    pub fn with_pause_guard(mut self, ms: u64) -> Self {
        self.pause_guard = Duration::from_millis(ms);
        self
    }

    pub fn with_event_limit(mut self, limit: usize) -> Self {
        self.event_limit = limit.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_watcher_cadence() {
        let c = EngineConfig::default();
        assert_eq!(c.min_considered_duration, 100.0);
        assert_eq!(c.min_elapsed_to_confirm, 30.0);
        assert_eq!(c.watch_interval, Duration::from_secs(1));
        assert_eq!(c.autoplay_interval, Duration::from_millis(700));
        assert_eq!(c.autoplay_max_attempts, 40);
        assert_eq!(c.navigate_delay, Duration::from_millis(300));
    }

    #[test]
    fn builders_clamp_degenerate_values() {
        let c = EngineConfig::default()
            .with_watch_interval(0)
            .with_end_epsilon(-1.0)
            .with_event_limit(0);
        assert_eq!(c.watch_interval, Duration::from_millis(1));
        assert_eq!(c.end_epsilon, 0.0);
        assert_eq!(c.event_limit, 1);
    }
}
