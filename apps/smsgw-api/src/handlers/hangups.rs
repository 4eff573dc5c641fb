//! 挂断记录列表与删除 handlers。与短信列表同构，区别在可见性叠加
//! 设备集合判定，时间轴为 hangup_time。

use crate::AppState;
use crate::hub::hangup_record_to_dto;
use crate::middleware::{require_admin, require_auth};
use crate::utils::response::{not_found_error, storage_error};
use crate::visibility::scope_for;
use api_contract::{ApiResponse, CallHangupDto, MessageQuery, PageResponse};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::AuthContext;
use smsgw_storage::{AccessScope, CallHangupQuery, MessageType, PageRequest};

#[derive(serde::Deserialize)]
pub struct IdPath {
    id: String,
}

fn to_store_query(query: &MessageQuery) -> (CallHangupQuery, PageRequest) {
    (
        CallHangupQuery {
            device_id: query.device_id.clone(),
            com_port: query.com_port.clone(),
            caller_contains: query.caller_number.clone(),
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
) -> Result<PageResponse<CallHangupDto>, Response> {
    let (store_query, page) = to_store_query(query);
    let result = state
        .hangup_store
        .query_records(scope, &store_query, page)
        .await
        .map_err(storage_error)?;

    let ids: Vec<String> = result.data.iter().map(|record| record.id.clone()).collect();
    let read_ids = state
        .receipt_store
        .read_source_ids(&ctx.user_id, MessageType::Hangup, &ids)
        .await
        .map_err(storage_error)?;

    let data: Vec<CallHangupDto> = result
        .data
        .iter()
        .map(|record| {
            let mut dto = hangup_record_to_dto(record);
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

/// 可见范围内的挂断记录列表。
pub async fn list_hangups(
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

/// 管理员全量挂断记录。
pub async fn list_hangups_admin(
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

/// 软删除一条挂断记录。
pub async fn soft_delete_hangup(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_auth(&state, &headers) {
        return response;
    }
    match state.hangup_store.soft_delete_record(&path.id).await {
        Ok(true) => (StatusCode::OK, Json(ApiResponse::success(()))).into_response(),
        Ok(false) => not_found_error(),
        Err(err) => storage_error(err),
    }
}

/// 物理删除一条挂断记录（管理员）。
pub async fn hard_delete_hangup(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    match state.hangup_store.hard_delete_record(&path.id).await {
        Ok(true) => (StatusCode::OK, Json(ApiResponse::success(()))).into_response(),
        Ok(false) => not_found_error(),
        Err(err) => storage_error(err),
    }
}
