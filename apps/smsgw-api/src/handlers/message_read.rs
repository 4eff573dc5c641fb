//! 已读回执 handlers
//!
//! - POST /message-read/mark-read - 标记单条（重复标记静默成功）
//! - POST /message-read/mark-all-read - 按可见集合批量补写
//! - GET /message-read/unread-counts - 未读数 = 可见集合 − 回执集合

use crate::AppState;
use crate::middleware::require_auth;
use crate::utils::normalize_required;
use crate::utils::response::{bad_request_error, storage_error};
use crate::visibility::scope_for;
use api_contract::{ApiResponse, MarkAllReadRequest, MarkReadRequest, UnreadCountsDto};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::AuthContext;
use smsgw_storage::{AccessScope, MessageType};

/// 标记单条已读。重复标记幂等成功。
pub async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MarkReadRequest>,
) -> Response {
    let ctx = match require_auth(&state, &headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let Some(message_type) = MessageType::parse(&req.message_type) else {
        return bad_request_error("messageType must be Sms or Hangup");
    };
    let source_id = match normalize_required(req.source_id, "sourceId") {
        Ok(value) => value,
        Err(response) => return response,
    };
    match state
        .receipt_store
        .mark_read(&ctx.user_id, message_type, &source_id)
        .await
    {
        Ok(_) => (StatusCode::OK, Json(ApiResponse::success(()))).into_response(),
        Err(err) => storage_error(err),
    }
}

/// 批量标记已读：可见集合（可再按设备/端口过滤）减去已读后补写。
pub async fn mark_all_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MarkAllReadRequest>,
) -> Response {
    let ctx = match require_auth(&state, &headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let Some(message_type) = MessageType::parse(&req.message_type) else {
        return bad_request_error("messageType must be Sms or Hangup");
    };
    let scope = match scope_for(&state, &ctx, false).await {
        Ok(scope) => scope,
        Err(response) => return response,
    };
    let visible = match visible_ids(
        &state,
        &scope,
        message_type,
        req.device_id.as_deref(),
        req.com_port.as_deref(),
    )
    .await
    {
        Ok(visible) => visible,
        Err(response) => return response,
    };
    match state
        .receipt_store
        .insert_missing(&ctx.user_id, message_type, &visible)
        .await
    {
        Ok(inserted) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "marked": inserted }))),
        )
            .into_response(),
        Err(err) => storage_error(err),
    }
}

/// 未读数：对每种类型分别做集合差。
pub async fn unread_counts(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let ctx = match require_auth(&state, &headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let scope = match scope_for(&state, &ctx, false).await {
        Ok(scope) => scope,
        Err(response) => return response,
    };
    let sms = match unread_count(&state, &ctx, &scope, MessageType::Sms).await {
        Ok(count) => count,
        Err(response) => return response,
    };
    let hangup = match unread_count(&state, &ctx, &scope, MessageType::Hangup).await {
        Ok(count) => count,
        Err(response) => return response,
    };
    (
        StatusCode::OK,
        Json(ApiResponse::success(UnreadCountsDto { sms, hangup })),
    )
        .into_response()
}

async fn visible_ids(
    state: &AppState,
    scope: &AccessScope,
    message_type: MessageType,
    device_id: Option<&str>,
    com_port: Option<&str>,
) -> Result<Vec<String>, Response> {
    match message_type {
        MessageType::Sms => state
            .sms_store
            .visible_message_ids(scope, device_id, com_port)
            .await
            .map_err(storage_error),
        MessageType::Hangup => state
            .hangup_store
            .visible_record_ids(scope, device_id, com_port)
            .await
            .map_err(storage_error),
    }
}

async fn unread_count(
    state: &AppState,
    ctx: &AuthContext,
    scope: &AccessScope,
    message_type: MessageType,
) -> Result<i64, Response> {
    let visible = visible_ids(state, scope, message_type, None, None).await?;
    if visible.is_empty() {
        return Ok(0);
    }
    let read = state
        .receipt_store
        .read_source_ids(&ctx.user_id, message_type, &visible)
        .await
        .map_err(storage_error)?;
    Ok((visible.len() - read.len()) as i64)
}
