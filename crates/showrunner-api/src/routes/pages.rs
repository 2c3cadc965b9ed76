use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use showrunner_core::{Category, PageRuntime, PageSnapshot, PlayerEvent, PlayerHandle, ReportedPlayer};

use crate::error::ApiError;
use crate::host::{CommandQueue, PageCommand};
use crate::routes::lists::ListTexts;
use crate::routes::{is_valid_url, parse_id};
use crate::state::{AppState, PageEntry};

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub url: String,
}

#[derive(Serialize)]
pub struct CreatePageResponse {
    pub id: Uuid,
    pub active: bool,
    pub category: Option<Category>,
    pub on_listed_page: bool,
}

#[derive(Serialize)]
pub struct PageDetail {
    pub opened_at: String,
    pub pending_commands: usize,
    #[serde(flatten)]
    pub snapshot: PageSnapshot,
}

#[derive(Serialize)]
pub struct PagesResponse {
    pub pages: Vec<PageDetail>,
}

#[derive(Debug, Deserialize)]
pub struct PlayerEventRequest {
    pub kind: PlayerEvent,
}

#[derive(Serialize)]
pub struct CommandsResponse {
    pub commands: Vec<PageCommand>,
}

#[derive(Serialize)]
pub struct NavigationResponse {
    pub navigating: bool,
    pub position: Option<usize>,
}

#[derive(Serialize)]
pub struct DeletePageResponse {
    pub message: String,
    pub id: Uuid,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pages", post(create_page).get(list_pages))
        .route("/pages/{id}", get(get_page).delete(delete_page))
        .route("/pages/{id}/location", post(change_location))
        .route("/pages/{id}/player", put(report_player))
        .route("/pages/{id}/player/events", post(player_event))
        .route("/pages/{id}/commands", get(drain_commands))
        .route("/pages/{id}/start", post(start_from_first))
        .route("/pages/{id}/resume", post(resume_from_current))
}

fn page_entry(state: &AppState, id: &str) -> Result<PageEntry, ApiError> {
    let id = parse_id(id)?;
    state
        .page(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Page {} not found", id)))
}

async fn detail(entry: &PageEntry) -> PageDetail {
    PageDetail {
        opened_at: entry.opened_at.to_rfc3339(),
        pending_commands: entry.commands.len(),
        snapshot: entry.runtime.snapshot().await,
    }
}

/// POST /api/v1/pages
async fn create_page(
    State(state): State<AppState>,
    Json(body): Json<LocationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_valid_url(&body.url) {
        return Err(ApiError::BadRequest(format!("Invalid page URL: {}", body.url)));
    }

    let player = Arc::new(ReportedPlayer::new());
    let commands = Arc::new(CommandQueue::new());
    let runtime = PageRuntime::open(
        state.engine.clone(),
        player.clone(),
        commands.clone(),
        body.url,
    )
    .await;
    let snapshot = runtime.snapshot().await;

    state.pages.insert(
        snapshot.id,
        PageEntry {
            runtime: Arc::new(runtime),
            player,
            commands,
            opened_at: Utc::now(),
        },
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatePageResponse {
            id: snapshot.id,
            active: snapshot.active,
            category: snapshot.category,
            on_listed_page: snapshot.on_listed_page,
        }),
    ))
}

/// GET /api/v1/pages
async fn list_pages(State(state): State<AppState>) -> Json<PagesResponse> {
    let mut pages = Vec::new();
    for (_, entry) in state.page_entries() {
        pages.push(detail(&entry).await);
    }
    pages.sort_by(|a, b| a.opened_at.cmp(&b.opened_at));
    Json(PagesResponse { pages })
}

/// GET /api/v1/pages/{id}
async fn get_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PageDetail>, ApiError> {
    let entry = page_entry(&state, &id)?;
    Ok(Json(detail(&entry).await))
}

/// DELETE /api/v1/pages/{id}
async fn delete_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletePageResponse>, ApiError> {
    let id = parse_id(&id)?;
    let (_, entry) = state
        .pages
        .remove(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Page {} not found", id)))?;
    entry.runtime.close();

    Ok(Json(DeletePageResponse {
        message: "Page closed".into(),
        id,
    }))
}

/// POST /api/v1/pages/{id}/location
async fn change_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<LocationRequest>,
) -> Result<Json<PageDetail>, ApiError> {
    let entry = page_entry(&state, &id)?;
    if !is_valid_url(&body.url) {
        return Err(ApiError::BadRequest(format!("Invalid page URL: {}", body.url)));
    }
    entry.runtime.route_changed(&body.url).await;
    Ok(Json(detail(&entry).await))
}

/// PUT /api/v1/pages/{id}/player
async fn report_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Option<PlayerHandle>>,
) -> Result<StatusCode, ApiError> {
    let entry = page_entry(&state, &id)?;
    entry.player.report(body);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/pages/{id}/player/events
async fn player_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PlayerEventRequest>,
) -> Result<StatusCode, ApiError> {
    let entry = page_entry(&state, &id)?;
    entry.runtime.player_event(body.kind).await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/pages/{id}/commands
///
/// Draining a navigation closes the page.
async fn drain_commands(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CommandsResponse>, ApiError> {
    let entry = page_entry(&state, &id)?;
    let commands = entry.commands.drain();

    // The shim unloads the page to follow a navigation; its successor
    // registers as a new page.
    if commands
        .iter()
        .any(|c| matches!(c, PageCommand::Navigate { .. }))
    {
        let page_id = entry.runtime.id();
        if let Some((_, gone)) = state.pages.remove(&page_id) {
            gone.runtime.close();
            info!(%page_id, "Page evicted after navigation handoff");
        }
    }

    Ok(Json(CommandsResponse { commands }))
}

/// POST /api/v1/pages/{id}/start
async fn start_from_first(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let entry = page_entry(&state, &id)?;
    apply_editor_texts(&state, &entry, &body).await?;
    let navigating = entry.runtime.start_from_first().await;
    navigation_response(&state, navigating).await
}

/// POST /api/v1/pages/{id}/resume
async fn resume_from_current(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let entry = page_entry(&state, &id)?;
    apply_editor_texts(&state, &entry, &body).await?;
    let navigating = entry.runtime.resume_from_current().await;
    navigation_response(&state, navigating).await
}

/// Start and resume may carry the editor's current texts, applied first.
async fn apply_editor_texts(
    state: &AppState,
    entry: &PageEntry,
    body: &[u8],
) -> Result<(), ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }
    let texts: ListTexts = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid list texts: {e}")))?;
    let location = entry.runtime.location();
    state
        .engine
        .lock()
        .await
        .set_lists(texts.into_lists(), Some(&location));
    info!(page_id = %entry.runtime.id(), "Editor lists applied");
    Ok(())
}

async fn navigation_response(
    state: &AppState,
    navigating: bool,
) -> Result<(StatusCode, Json<NavigationResponse>), ApiError> {
    if !navigating {
        return Err(ApiError::Conflict("The episode sequence is empty".into()));
    }
    let position = state.engine.lock().await.position();
    Ok((
        StatusCode::ACCEPTED,
        Json(NavigationResponse {
            navigating,
            position,
        }),
    ))
}
