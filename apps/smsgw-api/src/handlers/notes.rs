//! 备注 CRUD handlers（按用户隔离，纯文本内容）。

use crate::AppState;
use crate::middleware::require_auth;
use crate::utils::{normalize_optional, normalize_required};
use crate::utils::response::{bad_request_error, not_found_error, note_to_dto, storage_error};
use api_contract::{ApiResponse, CreateNoteRequest, NoteDto, UpdateNoteRequest};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use smsgw_storage::{NoteRecord, NoteUpdate};
use uuid::Uuid;

#[derive(serde::Deserialize)]
pub struct IdPath {
    id: String,
}

pub async fn list_notes(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let ctx = match require_auth(&state, &headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match state.note_store.list_notes(&ctx.user_id).await {
        Ok(items) => {
            let data: Vec<NoteDto> = items.into_iter().map(note_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => storage_error(err),
    }
}

pub async fn get_note(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> Response {
    let ctx = match require_auth(&state, &headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match state.note_store.find_note(&ctx.user_id, &path.id).await {
        Ok(Some(item)) => {
            (StatusCode::OK, Json(ApiResponse::success(note_to_dto(item)))).into_response()
        }
        Ok(None) => not_found_error(),
        Err(err) => storage_error(err),
    }
}

pub async fn create_note(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateNoteRequest>,
) -> Response {
    let ctx = match require_auth(&state, &headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let title = match normalize_required(req.title, "title") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let now = Utc::now();
    let record = NoteRecord {
        id: Uuid::new_v4().to_string(),
        user_id: ctx.user_id,
        title,
        content: req.content,
        is_deleted: false,
        create_time: now,
        update_time: now,
    };
    match state.note_store.create_note(record).await {
        Ok(item) => {
            (StatusCode::OK, Json(ApiResponse::success(note_to_dto(item)))).into_response()
        }
        Err(err) => storage_error(err),
    }
}

pub async fn update_note(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
    Json(req): Json<UpdateNoteRequest>,
) -> Response {
    let ctx = match require_auth(&state, &headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    if req.title.is_none() && req.content.is_none() {
        return bad_request_error("empty update");
    }
    let title = match normalize_optional(req.title, "title") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let update = NoteUpdate {
        title,
        content: req.content,
    };
    match state
        .note_store
        .update_note(&ctx.user_id, &path.id, update)
        .await
    {
        Ok(Some(item)) => {
            (StatusCode::OK, Json(ApiResponse::success(note_to_dto(item)))).into_response()
        }
        Ok(None) => not_found_error(),
        Err(err) => storage_error(err),
    }
}

pub async fn delete_note(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> Response {
    let ctx = match require_auth(&state, &headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match state.note_store.delete_note(&ctx.user_id, &path.id).await {
        Ok(true) => (StatusCode::OK, Json(ApiResponse::success(()))).into_response(),
        Ok(false) => not_found_error(),
        Err(err) => storage_error(err),
    }
}
