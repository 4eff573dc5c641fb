//! 短信列表与删除 handlers
//!
//! - GET /smsmessages - 可见范围内的分页列表（isRead 富化）
//! - GET /smsmessages/admin/all - 管理员全量（可含软删除）
//! - DELETE /smsmessages/{id} - 软删除
//! - DELETE /smsmessages/admin/hard-delete/{id} - 物理删除
//!
//! 可见性在存储层强制执行；本层只负责构造范围与查询条件。

use crate::AppState;
use crate::hub::sms_record_to_dto;
use crate::middleware::{require_admin, require_auth};
use crate::utils::response::{not_found_error, storage_error};
use crate::visibility::scope_for;
use api_contract::{ApiResponse, MessageQuery, PageResponse, SmsMessageDto};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::AuthContext;
use smsgw_storage::{AccessScope, MessageType, PageRequest, SmsMessageQuery};

#[derive(serde::Deserialize)]
pub struct IdPath {
    id: String,
}

fn to_store_query(query: &MessageQuery) -> (SmsMessageQuery, PageRequest) {
    (
        SmsMessageQuery {
            device_id: query.device_id.clone(),
            com_port: query.com_port.clone(),
            sender_contains: query.sender_number.clone(),
            start_time: query.start_time,
            end_time: query.end_time,
        },
        PageRequest::new(query.page_number, query.page_size),
    )
}

async fn query_page(
    state: &AppState,
    ctx: &AuthContext,
    scope: &AccessScope,
    query: &MessageQuery,
) -> Result<PageResponse<SmsMessageDto>, Response> {
    let (store_query, page) = to_store_query(query);
    let result = state
        .sms_store
        .query_messages(scope, &store_query, page)
        .await
        .map_err(storage_error)?;

    // 回执集合按页取一次，逐行标记 isRead
    let ids: Vec<String> = result.data.iter().map(|record| record.id.clone()).collect();
    let read_ids = state
        .receipt_store
        .read_source_ids(&ctx.user_id, MessageType::Sms, &ids)
        .await
        .map_err(storage_error)?;

    let data: Vec<SmsMessageDto> = result
        .data
        .iter()
        .map(|record| {
            let mut dto = sms_record_to_dto(record);
            dto.is_read = read_ids.contains(&record.id);
            dto
        })
        .collect();
    Ok(PageResponse {
        total_count: result.total_count,
        page_number: result.page_number,
        page_size: result.page_size,
        data,
    })
}

/// 可见范围内的短信列表。
pub async fn list_sms_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    headers: HeaderMap,
) -> Response {
    let ctx = match require_auth(&state, &headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let scope = match scope_for(&state, &ctx, false).await {
        Ok(scope) => scope,
        Err(response) => return response,
    };
    match query_page(&state, &ctx, &scope, &query).await {
        Ok(page) => (StatusCode::OK, Json(ApiResponse::success(page))).into_response(),
        Err(response) => response,
    }
}

/// 管理员全量短信列表（includeDeleted=true 时含软删除行）。
pub async fn list_sms_messages_admin(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    headers: HeaderMap,
) -> Response {
    let ctx = match require_admin(&state, &headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let scope = AccessScope::admin(query.include_deleted.unwrap_or(false));
    match query_page(&state, &ctx, &scope, &query).await {
        Ok(page) => (StatusCode::OK, Json(ApiResponse::success(page))).into_response(),
        Err(response) => response,
    }
}

/// 软删除一条短信。
pub async fn soft_delete_sms(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_auth(&state, &headers) {
        return response;
    }
    match state.sms_store.soft_delete_message(&path.id).await {
        Ok(true) => (StatusCode::OK, Json(ApiResponse::success(()))).into_response(),
        Ok(false) => not_found_error(),
        Err(err) => storage_error(err),
    }
}

/// 物理删除一条短信（管理员）。
pub async fn hard_delete_sms(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    match state.sms_store.hard_delete_message(&path.id).await {
        Ok(true) => (StatusCode::OK, Json(ApiResponse::success(()))).into_response(),
        Ok(false) => not_found_error(),
        Err(err) => storage_error(err),
    }
}
