//! COM 分配 CRUD handlers（管理员）。
//!
//! 分配是普通用户可见性的唯一来源：userId → {deviceId, comPorts}。
//! 端口串在入库前做 trim 清洗，比较时的归一化由存储层负责。

use crate::AppState;
use crate::middleware::require_admin;
use crate::utils::{normalize_optional, normalize_required};
use crate::utils::response::{allocation_to_dto, bad_request_error, not_found_error, storage_error};
use api_contract::{
    ApiResponse, ComAllocationDto, CreateComAllocationRequest, UpdateComAllocationRequest,
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use smsgw_storage::{ComAllocationRecord, ComAllocationUpdate};
use uuid::Uuid;

#[derive(serde::Deserialize)]
pub struct IdPath {
    id: String,
}

fn clean_ports(ports: Vec<String>) -> Vec<String> {
    ports
        .into_iter()
        .map(|port| port.trim().to_string())
        .filter(|port| !port.is_empty())
        .collect()
}

/// 列出全部分配。
pub async fn list_allocations(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    match state.allocation_store.list_all().await {
        Ok(items) => {
            let data: Vec<ComAllocationDto> = items.into_iter().map(allocation_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => storage_error(err),
    }
}

/// 获取单条分配。
pub async fn get_allocation(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    match state.allocation_store.find_by_id(&path.id).await {
        Ok(Some(item)) => (
            StatusCode::OK,
            Json(ApiResponse::success(allocation_to_dto(item))),
        )
            .into_response(),
        Ok(None) => not_found_error(),
        Err(err) => storage_error(err),
    }
}

/// 创建分配。目标用户必须存在。
pub async fn create_allocation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateComAllocationRequest>,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    let user_id = match normalize_required(req.user_id, "userId") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let device_id = match normalize_required(req.device_id, "deviceId") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let com_ports = clean_ports(req.com_ports);
    if com_ports.is_empty() {
        return bad_request_error("comPorts required");
    }
    match state.user_store.find_by_id(&user_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return bad_request_error("user not found"),
        Err(err) => return storage_error(err),
    }
    let now = Utc::now();
    let record = ComAllocationRecord {
        id: Uuid::new_v4().to_string(),
        user_id,
        device_id,
        com_ports,
        is_deleted: false,
        create_time: now,
        update_time: now,
    };
    match state.allocation_store.create_allocation(record).await {
        Ok(item) => (
            StatusCode::OK,
            Json(ApiResponse::success(allocation_to_dto(item))),
        )
            .into_response(),
        Err(err) => storage_error(err),
    }
}

/// 更新分配。
pub async fn update_allocation(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
    Json(req): Json<UpdateComAllocationRequest>,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    let device_id = match normalize_optional(req.device_id, "deviceId") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let com_ports = req.com_ports.map(clean_ports);
    if let Some(ports) = &com_ports {
        if ports.is_empty() {
            return bad_request_error("comPorts required");
        }
    }
    if device_id.is_none() && com_ports.is_none() {
        return bad_request_error("empty update");
    }
    let update = ComAllocationUpdate {
        device_id,
        com_ports,
    };
    match state
        .allocation_store
        .update_allocation(&path.id, update)
        .await
    {
        Ok(Some(item)) => (
            StatusCode::OK,
            Json(ApiResponse::success(allocation_to_dto(item))),
        )
            .into_response(),
        Ok(None) => not_found_error(),
        Err(err) => storage_error(err),
    }
}

/// 软删除分配（该用户对应可见范围随之收缩）。
pub async fn delete_allocation(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    match state.allocation_store.delete_allocation(&path.id).await {
        Ok(true) => (StatusCode::OK, Json(ApiResponse::success(()))).into_response(),
        Ok(false) => not_found_error(),
        Err(err) => storage_error(err),
    }
}
