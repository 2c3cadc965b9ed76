use std::fmt::Write;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use chrono::Utc;

use showrunner_core::engine::{ConfirmationPhase, EventKind};

use crate::state::AppState;

/// GET /metrics, OpenMetrics text exposition.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut out = String::with_capacity(2048);

    let (instance_id, status, event_counts) = {
        let engine = state.engine.lock().await;
        let counts: Vec<(EventKind, usize)> = EventKind::ALL
            .into_iter()
            .map(|k| (k, engine.event_count(k)))
            .collect();
        (engine.instance_id().to_string(), engine.status(), counts)
    };

    let _ = writeln!(out, "# TYPE showrunner_info info");
    let _ = writeln!(out, "# HELP showrunner_info Information about the showrunner engine");
    let _ = writeln!(out, "showrunner_info{{instance_id=\"{}\"}} 1", instance_id);

    let _ = writeln!(out, "# TYPE showrunner_sequence_length gauge");
    let _ = writeln!(out, "# HELP showrunner_sequence_length Entries in the master sequence");
    let _ = writeln!(out, "showrunner_sequence_length {}", status.sequence_length);

    let _ = writeln!(out, "# TYPE showrunner_position gauge");
    let _ = writeln!(out, "# HELP showrunner_position Tracked position in the master sequence");
    if let Some(position) = status.position {
        let _ = writeln!(out, "showrunner_position {}", position);
    }

    let _ = writeln!(out, "# TYPE showrunner_category_lines gauge");
    let _ = writeln!(out, "# HELP showrunner_category_lines Stored lines per category");
    for c in &status.lines {
        let _ = writeln!(
            out,
            "showrunner_category_lines{{category=\"{}\"}} {}",
            c.category, c.lines
        );
    }

    let _ = writeln!(out, "# TYPE showrunner_category_episodes gauge");
    let _ = writeln!(out, "# HELP showrunner_category_episodes Parsed episodes per category");
    for c in &status.lines {
        let _ = writeln!(
            out,
            "showrunner_category_episodes{{category=\"{}\"}} {}",
            c.category, c.episodes
        );
    }

    let _ = writeln!(out, "# TYPE showrunner_recent_events gauge");
    let _ = writeln!(out, "# HELP showrunner_recent_events Events of each kind in the event buffer");
    for (kind, count) in &event_counts {
        let _ = writeln!(
            out,
            "showrunner_recent_events{{kind=\"{}\"}} {}",
            kind.as_str(),
            count
        );
    }

    let pages = state.page_entries();
    let _ = writeln!(out, "# TYPE showrunner_pages gauge");
    let _ = writeln!(out, "# HELP showrunner_pages Open page sessions");
    let _ = writeln!(out, "showrunner_pages {}", pages.len());

    let mut snapshots = Vec::with_capacity(pages.len());
    for (_, entry) in &pages {
        snapshots.push(entry.runtime.snapshot().await);
    }

    let _ = writeln!(out, "# TYPE showrunner_page_confirmation stateset");
    let _ = writeln!(out, "# HELP showrunner_page_confirmation Playback confirmation per page");
    for s in &snapshots {
        for phase in [ConfirmationPhase::Unconfirmed, ConfirmationPhase::Confirmed] {
            let _ = writeln!(
                out,
                "showrunner_page_confirmation{{page_id=\"{}\",showrunner_page_confirmation=\"{}\"}} {}",
                s.id,
                phase,
                u8::from(s.confirmation == phase)
            );
        }
    }

    let _ = writeln!(out, "# TYPE showrunner_page_watched_seconds gauge");
    let _ = writeln!(out, "# HELP showrunner_page_watched_seconds Forward playback counted toward confirmation");
    for s in &snapshots {
        let _ = writeln!(
            out,
            "showrunner_page_watched_seconds{{page_id=\"{}\"}} {:.3}",
            s.id, s.watched_secs
        );
    }

    let _ = writeln!(out, "# TYPE showrunner_page_user_paused gauge");
    let _ = writeln!(out, "# HELP showrunner_page_user_paused Whether the user paused the page");
    for s in &snapshots {
        let _ = writeln!(
            out,
            "showrunner_page_user_paused{{page_id=\"{}\"}} {}",
            s.id,
            u8::from(s.user_paused)
        );
    }

    let _ = writeln!(out, "# TYPE showrunner_uptime_seconds gauge");
    let _ = writeln!(out, "# HELP showrunner_uptime_seconds Time since the server started");
    let uptime = (Utc::now() - state.started_at).num_milliseconds() as f64 / 1000.0;
    let _ = writeln!(out, "showrunner_uptime_seconds {:.3}", uptime);

    let _ = writeln!(out, "# EOF");

    (
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        out,
    )
}
