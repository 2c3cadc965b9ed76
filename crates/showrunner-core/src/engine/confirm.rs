//! Per-page decision of whether a real episode, not a teaser or an ambient
//! loop, is playing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::player::PlayerHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationPhase {
    Unconfirmed,
    Confirmed,
}

impl ConfirmationPhase {
    /// One-way per page view; only a reset returns to `Unconfirmed`.
    pub fn can_transition_to(self, target: ConfirmationPhase) -> bool {
        matches!(
            (self, target),
            (ConfirmationPhase::Unconfirmed, ConfirmationPhase::Confirmed)
        )
    }
}

impl fmt::Display for ConfirmationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconfirmed => write!(f, "unconfirmed"),
            Self::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// Short media with a known duration.
pub fn looks_like_teaser(player: &PlayerHandle, config: &EngineConfig) -> bool {
    player
        .known_duration()
        .is_some_and(|d| d < config.min_considered_duration)
}

/// Looping media, or muted media without native controls.
pub fn likely_background(player: &PlayerHandle) -> bool {
    player.looping || (player.muted && !player.controls_visible)
}

/// In-memory confirmation record. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfirmationState {
    pub phase: ConfirmationPhase,
    pub accumulated_secs: f64,
    pub last_position: f64,
}

impl Default for ConfirmationState {
    fn default() -> Self {
        Self {
            phase: ConfirmationPhase::Unconfirmed,
            accumulated_secs: 0.0,
            last_position: 0.0,
        }
    }
}

impl ConfirmationState {
    pub fn is_confirmed(&self) -> bool {
        self.phase == ConfirmationPhase::Confirmed
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold one telemetry sample in. Returns true on the sample that confirms.
    ///
    /// Only forward movement counts as watched time, so seeking back or
    /// replaying never inflates the total.
    pub fn observe(&mut self, player: &PlayerHandle, config: &EngineConfig) -> bool {
        if !player.position.is_finite() {
            return false;
        }
        let delta = (player.position - self.last_position).max(0.0);
        self.last_position = player.position;
        self.accumulated_secs += delta;

        if self.is_confirmed() {
            return false;
        }

        let teaser = looks_like_teaser(player, config);
        if teaser && likely_background(player) {
            return false;
        }
        if !teaser && self.accumulated_secs >= config.min_elapsed_to_confirm {
            debug_assert!(self.phase.can_transition_to(ConfirmationPhase::Confirmed));
            self.phase = ConfirmationPhase::Confirmed;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(position: f64) -> PlayerHandle {
        PlayerHandle {
            position,
            duration: Some(1800.0),
            controls_visible: true,
            ..Default::default()
        }
    }

    fn feed(state: &mut ConfirmationState, samples: impl IntoIterator<Item = PlayerHandle>) {
        let config = EngineConfig::default();
        for s in samples {
            state.observe(&s, &config);
        }
    }

    #[test]
    fn phase_transitions() {
        assert!(ConfirmationPhase::Unconfirmed.can_transition_to(ConfirmationPhase::Confirmed));
        assert!(!ConfirmationPhase::Confirmed.can_transition_to(ConfirmationPhase::Unconfirmed));
        assert!(!ConfirmationPhase::Confirmed.can_transition_to(ConfirmationPhase::Confirmed));
    }

    #[test]
    fn confirms_after_thirty_forward_seconds() {
        let mut state = ConfirmationState::default();
        feed(&mut state, (1..=29).map(|t| episode(t as f64)));
        assert!(!state.is_confirmed());
        assert_eq!(state.accumulated_secs, 29.0);
        feed(&mut state, [episode(30.0)]);
        assert!(state.is_confirmed());
    }

    #[test]
    fn backward_seeks_do_not_count() {
        let mut state = ConfirmationState::default();
        feed(
            &mut state,
            [episode(20.0), episode(5.0), episode(10.0), episode(2.0), episode(12.0)],
        );
        assert_eq!(state.accumulated_secs, 35.0);
        assert!(state.is_confirmed());

        let mut state = ConfirmationState::default();
        feed(&mut state, [episode(20.0), episode(0.0), episode(9.0)]);
        assert_eq!(state.accumulated_secs, 29.0);
        assert!(!state.is_confirmed());
    }

    #[test]
    fn teasers_never_confirm() {
        let mut state = ConfirmationState::default();
        let teaser = |t: f64| PlayerHandle {
            position: t,
            duration: Some(95.0),
            controls_visible: true,
            ..Default::default()
        };
        feed(&mut state, (0..95).map(|t| teaser(t as f64)));
        assert!(state.accumulated_secs >= 30.0);
        assert!(!state.is_confirmed());
    }

    #[test]
    fn ambient_teaser_is_held_unconfirmed() {
        let mut state = ConfirmationState::default();
        let ambient = |t: f64| PlayerHandle {
            position: t,
            duration: Some(45.0),
            looping: true,
            muted: true,
            ..Default::default()
        };
        feed(&mut state, (0..200).map(|t| ambient((t % 45) as f64)));
        assert!(!state.is_confirmed());
    }

    #[test]
    fn unknown_duration_is_not_a_teaser() {
        let mut state = ConfirmationState::default();
        let live = |t: f64| PlayerHandle {
            position: t,
            duration: None,
            ..Default::default()
        };
        feed(&mut state, (0..=31).map(|t| live(t as f64)));
        assert!(state.is_confirmed());
    }

    #[test]
    fn confirmation_is_sticky_until_reset() {
        let config = EngineConfig::default();
        let mut state = ConfirmationState::default();
        assert!(state.observe(&episode(31.0), &config));
        let teaser = PlayerHandle {
            position: 1.0,
            duration: Some(10.0),
            looping: true,
            ..Default::default()
        };
        assert!(!state.observe(&teaser, &config));
        assert!(state.is_confirmed());
        state.reset();
        assert!(!state.is_confirmed());
        assert_eq!(state.accumulated_secs, 0.0);
    }

    #[test]
    fn non_finite_positions_are_skipped() {
        let mut state = ConfirmationState::default();
        feed(&mut state, [episode(f64::NAN), episode(10.0)]);
        assert_eq!(state.accumulated_secs, 10.0);
    }

    #[test]
    fn classifiers() {
        let config = EngineConfig::default();
        let mut p = PlayerHandle {
            duration: Some(99.9),
            ..Default::default()
        };
        assert!(looks_like_teaser(&p, &config));
        p.duration = Some(100.0);
        assert!(!looks_like_teaser(&p, &config));
        p.muted = true;
        assert!(likely_background(&p));
        p.controls_visible = true;
        assert!(!likely_background(&p));
        p.looping = true;
        assert!(likely_background(&p));
    }
}
