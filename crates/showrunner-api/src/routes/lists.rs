use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use showrunner_core::engine::export_file_name;
use showrunner_core::{Category, CategoryLists, EngineEvent, EngineStatus, PersistedState};

use crate::error::ApiError;
use crate::state::AppState;

/// The four category texts as an editor shows them, one entry per line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTexts {
    #[serde(default)]
    pub raw: String,
    #[serde(default)]
    pub sd: String,
    #[serde(default)]
    pub ppv: String,
    #[serde(default)]
    pub heat: String,
}

impl ListTexts {
    pub fn from_lists(lists: &CategoryLists) -> Self {
        Self {
            raw: lists.text(Category::Raw),
            sd: lists.text(Category::Sd),
            ppv: lists.text(Category::Ppv),
            heat: lists.text(Category::Heat),
        }
    }

    pub fn into_lists(self) -> CategoryLists {
        CategoryLists::from_texts(&self.raw, &self.sd, &self.ppv, &self.heat)
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveListsRequest {
    #[serde(flatten)]
    pub texts: ListTexts,
    /// Page location to re-resolve the position against after the rebuild.
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub location: Option<String>,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub events: Vec<EngineEvent>,
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub message: String,
    pub entries: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/lists", get(get_lists).put(save_lists))
        .route("/state", get(get_state))
        .route("/status", get(get_status))
        .route("/events", get(get_events))
        .route("/export", get(export_lists))
        .route("/import", post(import_lists))
}

/// GET /api/v1/lists
async fn get_lists(State(state): State<AppState>) -> Json<ListTexts> {
    let engine = state.engine.lock().await;
    Json(ListTexts::from_lists(engine.lists()))
}

/// PUT /api/v1/lists
async fn save_lists(
    State(state): State<AppState>,
    Json(body): Json<SaveListsRequest>,
) -> Json<EngineStatus> {
    let mut engine = state.engine.lock().await;
    engine.set_lists(body.texts.into_lists(), body.location.as_deref());
    info!(entries = engine.master().len(), "Lists saved");
    Json(engine.status())
}

/// GET /api/v1/state
async fn get_state(State(state): State<AppState>) -> Json<PersistedState> {
    let engine = state.engine.lock().await;
    Json(engine.state().clone())
}

/// GET /api/v1/status
async fn get_status(State(state): State<AppState>) -> Json<EngineStatus> {
    let status = state.engine.lock().await.status();
    Json(status)
}

/// GET /api/v1/events
async fn get_events(State(state): State<AppState>) -> Json<EventsResponse> {
    let events = state.engine.lock().await.events();
    Json(EventsResponse { events })
}

/// GET /api/v1/export
async fn export_lists(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    let export = state.engine.lock().await.export_lists_at(now);
    let file_name = export_file_name(now);
    (
        [(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        )],
        Json(export),
    )
}

/// POST /api/v1/import
async fn import_lists(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
    body: String,
) -> Result<Json<ImportResponse>, ApiError> {
    let entries = state
        .engine
        .lock()
        .await
        .import_lists(&body, query.location.as_deref())?;
    Ok(Json(ImportResponse {
        message: "Lists imported".into(),
        entries,
    }))
}
