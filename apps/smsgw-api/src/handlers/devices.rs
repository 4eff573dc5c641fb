//! 设备与集线器入口 handlers
//!
//! - GET /device/connected - 在线设备列表
//! - POST /device/scan-com-ports/{deviceId} - 触发远端扫描
//! - GET/POST /device/com-snapshot/{deviceId} - 读取/覆盖写入快照
//! - POST /device/start-sms-receiver/{deviceId} - 启动远端监听
//! - POST /device/stop-sms-receiver/{deviceId} - 停止远端监听
//! - POST /device/send-sms - 创建发送记录并下发发送命令
//! - GET /hub/agent, /hub/client - WebSocket 升级入口
//!
//! 权限要求：
//! - 快照写入与扫描触发需要管理员
//! - 客户端 WebSocket 通过 access_token 查询参数认证

use crate::AppState;
use crate::hub::{run_agent_socket, run_client_socket};
use crate::middleware::{require_admin, require_auth};
use crate::utils::normalize_required;
use crate::utils::response::{
    bad_request_error, device_offline_error, not_found_error, send_record_to_dto, snapshot_to_dto,
    storage_error,
};
use api_contract::{ApiResponse, SendSmsRequest, UpsertSnapshotRequest};
use axum::{
    Json,
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use smsgw_storage::{DeviceComSnapshotRecord, SmsSendRecord};
use smsgw_telemetry::{record_scan_requested, record_send_requested};
use uuid::Uuid;

#[derive(serde::Deserialize)]
pub struct DevicePath {
    device_id: String,
}

#[derive(serde::Deserialize)]
pub struct ClientHubQuery {
    access_token: Option<String>,
}

/// 在线设备列表（去重、排序、大小写不敏感）。
pub async fn connected_devices(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_auth(&state, &headers) {
        return response;
    }
    let ids = state.hub.connected_device_ids().await;
    (StatusCode::OK, Json(ApiResponse::success(ids))).into_response()
}

/// 触发指定设备的 COM 口扫描。
pub async fn scan_com_ports(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    record_scan_requested();
    if !state.hub.request_com_port_scan(&path.device_id).await {
        return device_offline_error(&path.device_id);
    }
    (StatusCode::OK, Json(ApiResponse::success(()))).into_response()
}

/// 读取设备快照。
pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_auth(&state, &headers) {
        return response;
    }
    match state.snapshot_store.find_snapshot(&path.device_id).await {
        Ok(Some(record)) => (
            StatusCode::OK,
            Json(ApiResponse::success(snapshot_to_dto(record))),
        )
            .into_response(),
        Ok(None) => not_found_error(),
        Err(err) => storage_error(err),
    }
}

/// 覆盖写入设备快照（管理员手工维护入口）。
///
/// 请求体内每个端口的 deviceId 以路径参数为准改写。
pub async fn upsert_snapshot(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    headers: HeaderMap,
    Json(req): Json<UpsertSnapshotRequest>,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    let mut ports = req.ports;
    for port in &mut ports {
        port.device_id = path.device_id.clone();
    }
    let data_json = match serde_json::to_string(&ports) {
        Ok(data_json) => data_json,
        Err(err) => return bad_request_error(format!("ports: {err}")),
    };
    let record = DeviceComSnapshotRecord {
        device_id: path.device_id,
        data_json,
        updated_time: Utc::now(),
    };
    match state.snapshot_store.upsert_snapshot(record).await {
        Ok(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(snapshot_to_dto(record))),
        )
            .into_response(),
        Err(err) => storage_error(err),
    }
}

/// 启动指定设备的短信监听（Agent 侧幂等）。
pub async fn start_sms_receiver(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    headers: HeaderMap,
    Json(ports): Json<Vec<api_contract::ListenPortDto>>,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    if ports.is_empty() {
        return bad_request_error("ports required");
    }
    if !state
        .hub
        .request_start_receiver(&path.device_id, ports)
        .await
    {
        return device_offline_error(&path.device_id);
    }
    (StatusCode::OK, Json(ApiResponse::success(()))).into_response()
}

/// 停止指定设备的短信监听。
pub async fn stop_sms_receiver(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    if !state.hub.request_stop_receiver(&path.device_id).await {
        return device_offline_error(&path.device_id);
    }
    (StatusCode::OK, Json(ApiResponse::success(()))).into_response()
}

/// 发送短信：创建 Pending 发送记录，命令路由到目标设备的 Agent。
/// 结果由 Agent 的 SendSmsResult 回写并广播。
pub async fn send_sms(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SendSmsRequest>,
) -> Response {
    if let Err(response) = require_auth(&state, &headers) {
        return response;
    }
    let device_id = match normalize_required(req.device_id, "deviceId") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let com_port = match normalize_required(req.com_port, "comPort") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let target_number = match normalize_required(req.target_number, "targetNumber") {
        Ok(value) => value,
        Err(response) => return response,
    };
    if req.message_content.is_empty() {
        return bad_request_error("messageContent required");
    }

    record_send_requested();
    let now = Utc::now();
    let record = SmsSendRecord {
        id: Uuid::new_v4().to_string(),
        device_id: device_id.clone(),
        com_port: com_port.clone(),
        target_number: target_number.clone(),
        message_content: req.message_content.clone(),
        status: "Pending".to_string(),
        error_message: None,
        create_time: now,
        update_time: now,
    };
    let record = match state.send_store.create_record(record).await {
        Ok(record) => record,
        Err(err) => return storage_error(err),
    };

    if !state
        .hub
        .request_send_sms(
            &device_id,
            &com_port,
            &target_number,
            &req.message_content,
            &record.id,
        )
        .await
    {
        let _ = state
            .send_store
            .update_status(&record.id, "Failed", Some("device not connected"))
            .await;
        return device_offline_error(&device_id);
    }
    (
        StatusCode::OK,
        Json(ApiResponse::success(send_record_to_dto(record))),
    )
        .into_response()
}

/// Agent WebSocket 升级入口。
pub async fn agent_hub(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| run_agent_socket(hub, socket))
}

/// 浏览器客户端 WebSocket 升级入口（token 经查询参数携带）。
pub async fn client_hub(
    State(state): State<AppState>,
    Query(query): Query<ClientHubQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = query.access_token.unwrap_or_default();
    if state.auth.verify_access_token(&token).is_err() {
        return crate::utils::response::auth_error(StatusCode::UNAUTHORIZED);
    }
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| run_client_socket(hub, socket))
}
