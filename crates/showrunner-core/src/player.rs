//! Capability interface for the page's video element.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Snapshot of the playable media on the current page.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerHandle {
    /// Current play position in seconds.
    pub position: f64,
    /// Total duration in seconds; `None` (or non-finite) while unknown or live.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub ended: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub controls_visible: bool,
}

impl PlayerHandle {
    /// Duration if finite and positive.
    pub fn known_duration(&self) -> Option<f64> {
        self.duration.filter(|d| d.is_finite() && *d > 0.0)
    }

    /// Position has reached within `epsilon` seconds of a known duration.
    pub fn near_end(&self, epsilon: f64) -> bool {
        self.known_duration()
            .is_some_and(|d| self.position >= d - epsilon)
    }
}

/// Finds the page's playable media, possibly inside an encapsulated subtree.
pub trait PlayerLocator: Send + Sync {
    fn locate(&self) -> Option<PlayerHandle>;
}

/// Locator fed by pushed telemetry: the latest report wins.
#[derive(Debug, Default)]
pub struct ReportedPlayer {
    latest: Mutex<Option<PlayerHandle>>,
}

impl ReportedPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest snapshot; `None` means the player went away.
    pub fn report(&self, handle: Option<PlayerHandle>) {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = handle;
    }
}

impl PlayerLocator for ReportedPlayer {
    fn locate(&self) -> Option<PlayerHandle> {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_durations_are_ignored() {
        let mut p = PlayerHandle {
            position: 10.0,
            ..Default::default()
        };
        assert_eq!(p.known_duration(), None);
        p.duration = Some(f64::INFINITY);
        assert_eq!(p.known_duration(), None);
        p.duration = Some(0.0);
        assert_eq!(p.known_duration(), None);
        p.duration = Some(12.5);
        assert_eq!(p.known_duration(), Some(12.5));
    }

    #[test]
    fn near_end_uses_epsilon() {
        let p = PlayerHandle {
            position: 1799.75,
            duration: Some(1800.0),
            ..Default::default()
        };
        assert!(p.near_end(0.3));
        assert!(!p.near_end(0.1));
    }

    #[test]
    fn telemetry_json_uses_page_names() {
        let p: PlayerHandle = serde_json::from_str(
            r#"{"position":3.5,"duration":null,"loop":true,"muted":true,"controlsVisible":false}"#,
        )
        .unwrap();
        assert!(p.looping);
        assert!(p.muted);
        assert!(!p.controls_visible);
        assert_eq!(p.duration, None);
    }

    #[test]
    fn reported_player_returns_latest() {
        let player = ReportedPlayer::new();
        assert!(player.locate().is_none());
        player.report(Some(PlayerHandle {
            position: 1.0,
            ..Default::default()
        }));
        assert_eq!(player.locate().unwrap().position, 1.0);
        player.report(None);
        assert!(player.locate().is_none());
    }
}
