use axum::{
    Json,
    body::to_bytes,
    extract::{Request, State, rejection::JsonRejection},
    http::StatusCode,
};
use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    leak::{LeakStats, RequestSnapshot},
    models::{Item, NewItem},
    state::AppState,
};

/// Upper bound on the body copied into a retained request.
pub const MAX_RETAINED_BODY: usize = 1024 * 1024;

pub async fn root() -> &'static str {
    "Welcome to leak-lab (axum + tokio)"
}

pub async fn leak_object(State(state): State<AppState>) -> AppResult<&'static str> {
    let retained = state.leaks.add_object_leak()?;
    debug!(retained, "object leak added");
    Ok("Memory leak added")
}

pub async fn leak_request(
    State(state): State<AppState>,
    request: Request,
) -> AppResult<&'static str> {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, MAX_RETAINED_BODY)
        .await
        .map_err(|err| AppError::validation(format!("failed to read request body: {err}")))?;

    let retained = state.leaks.add_request_leak(RequestSnapshot {
        method: parts.method,
        uri: parts.uri,
        version: parts.version,
        headers: parts.headers,
        body,
    })?;
    debug!(retained, "request leak added");
    Ok("Request added to leak array")
}

pub async fn leak_global(State(state): State<AppState>) -> AppResult<&'static str> {
    let key = state.leaks.add_global_slot_leak()?;
    debug!(%key, "global slot leak added");
    Ok("Hard leak created")
}

pub async fn leak_stats(State(state): State<AppState>) -> AppResult<Json<LeakStats>> {
    Ok(Json(state.leaks.stats()?))
}

pub async fn snapshot(State(state): State<AppState>) -> AppResult<&'static str> {
    state.snapshots.capture_snapshot()?;
    Ok("Heap snapshot taken")
}

pub async fn snapshot_after_gc(State(state): State<AppState>) -> AppResult<&'static str> {
    state.snapshots.capture_snapshot_after_gc()?;
    Ok("Heap snapshot with GC taken")
}

pub async fn create_item(
    State(state): State<AppState>,
    payload: Result<Json<NewItem>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let Json(payload) = payload.map_err(|rejection| AppError::validation(rejection.body_text()))?;

    let item = state.repo.create(payload).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn list_items(State(state): State<AppState>) -> AppResult<Json<Vec<Item>>> {
    Ok(Json(state.repo.list().await?))
}
