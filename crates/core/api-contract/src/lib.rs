//! 稳定的 DTO 与 API 响应契约。
//!
//! 约定：
//! - 所有 JSON 字段使用 lowerCamelCase
//! - 时间戳统一为 UTC（RFC 3339）
//! - 列表响应统一为 `{totalCount, pageNumber, pageSize, data}`

pub mod hub;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 稳定错误码清单（跨前后端对齐）。
pub mod error_codes {
    pub const AUTH_UNAUTHORIZED: &str = "AUTH.UNAUTHORIZED";
    pub const AUTH_FORBIDDEN: &str = "AUTH.FORBIDDEN";
    pub const INVALID_REQUEST: &str = "INVALID.REQUEST";
    pub const RESOURCE_NOT_FOUND: &str = "RESOURCE.NOT_FOUND";
    pub const RESOURCE_CONFLICT: &str = "RESOURCE.CONFLICT";
    pub const DEVICE_OFFLINE: &str = "DEVICE.OFFLINE";
    pub const INTERNAL_ERROR: &str = "INTERNAL.ERROR";
}

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 分页列表响应。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub total_count: i64,
    pub page_number: i64,
    pub page_size: i64,
    pub data: Vec<T>,
}

// ============================================================================
// 认证
// ============================================================================

/// 登录请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

/// 登录响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires: u64,
    pub user_name: String,
    pub role: String,
}

/// 刷新 token 请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[serde(alias = "refresh_token")]
    pub refresh_token: String,
}

/// 刷新 token 响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires: u64,
}

// ============================================================================
// 设备快照与扫描
// ============================================================================

/// 调制解调器详情（扫描细节查询结果）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModemInfoDto {
    pub has_sim_card: bool,
    pub iccid: Option<String>,
    pub operator: Option<String>,
    /// 0–31，99 表示未知。
    pub signal_strength: Option<i32>,
    pub signal_quality: Option<String>,
    pub phone_number: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub imei: Option<String>,
    pub sim_status: Option<String>,
    pub network_status: Option<String>,
}

/// 单个 COM 口的扫描结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfoDto {
    pub device_id: String,
    pub port_name: String,
    pub is_available: bool,
    pub is_sms_modem: bool,
    pub baud_rate: Option<u32>,
    pub modem_info: Option<ModemInfoDto>,
    /// 探测阶段收到的原始响应（排障用）。
    pub raw: Option<String>,
}

/// 全量扫描结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResultDto {
    pub scan_time: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    pub ports: Vec<PortInfoDto>,
}

/// 设备快照返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceComSnapshotDto {
    pub device_id: String,
    pub ports: Vec<PortInfoDto>,
    pub updated_time: DateTime<Utc>,
}

/// 快照覆盖写入请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSnapshotRequest {
    pub ports: Vec<PortInfoDto>,
}

/// 监听端口描述（启动接收器用）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenPortDto {
    pub port_name: String,
    pub baud_rate: u32,
}

// ============================================================================
// 短信与挂断记录
// ============================================================================

/// Agent 上报的收到短信事件。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsReceivedDto {
    pub device_id: String,
    pub com_port: String,
    pub sender_number: String,
    pub message_content: String,
    pub received_time: DateTime<Utc>,
    /// 模块原始时间戳串（`YY/MM/DD,HH:MM:SS±TZ`）。
    pub sms_timestamp: Option<String>,
}

/// Agent 上报的来电挂断事件。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallHangupEventDto {
    pub device_id: String,
    pub com_port: String,
    pub caller_number: Option<String>,
    pub hangup_time: DateTime<Utc>,
    pub reason: String,
    pub raw_line: Option<String>,
}

/// 短信列表返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsMessageDto {
    pub id: String,
    pub device_id: String,
    pub com_port: String,
    pub sender_number: String,
    pub message_content: String,
    pub received_time: DateTime<Utc>,
    pub sms_timestamp: Option<String>,
    pub operator: Option<String>,
    pub is_deleted: bool,
    pub is_read: bool,
}

/// 挂断记录列表返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallHangupDto {
    pub id: String,
    pub device_id: String,
    pub com_port: String,
    pub caller_number: Option<String>,
    pub hangup_time: DateTime<Utc>,
    pub reason: String,
    pub raw_line: Option<String>,
    pub is_deleted: bool,
    pub is_read: bool,
}

/// 短信/挂断列表查询参数。
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQuery {
    pub device_id: Option<String>,
    pub com_port: Option<String>,
    /// 短信为发送方号码、挂断为主叫号码，模糊匹配。
    pub sender_number: Option<String>,
    pub caller_number: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub page_number: Option<i64>,
    pub page_size: Option<i64>,
    pub include_deleted: Option<bool>,
}

// ============================================================================
// 已读回执
// ============================================================================

/// 标记单条已读请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    /// `Sms` 或 `Hangup`。
    pub message_type: String,
    pub source_id: String,
}

/// 批量标记已读请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadRequest {
    pub message_type: String,
    pub device_id: Option<String>,
    pub com_port: Option<String>,
}

/// 未读数返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountsDto {
    pub sms: i64,
    pub hangup: i64,
}

// ============================================================================
// 短信发送
// ============================================================================

/// 发送短信请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsRequest {
    pub device_id: String,
    pub com_port: String,
    pub target_number: String,
    pub message_content: String,
}

/// 发送记录返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsSendRecordDto {
    pub id: String,
    pub device_id: String,
    pub com_port: String,
    pub target_number: String,
    /// Pending | Success | Failed
    pub status: String,
    pub error_message: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

// ============================================================================
// COM 分配
// ============================================================================

/// COM 分配返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComAllocationDto {
    pub id: String,
    pub user_id: String,
    pub device_id: String,
    pub com_ports: Vec<String>,
}

/// COM 分配创建请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComAllocationRequest {
    pub user_id: String,
    pub device_id: String,
    pub com_ports: Vec<String>,
}

/// COM 分配更新请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateComAllocationRequest {
    pub device_id: Option<String>,
    pub com_ports: Option<Vec<String>>,
}

// ============================================================================
// 用户与备注
// ============================================================================

/// 用户返回结构（不包含口令散列）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub user_name: String,
    pub role: String,
    pub is_deleted: bool,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// 用户创建请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub user_name: String,
    pub password: String,
    pub role: Option<String>,
}

/// 用户更新请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub password: Option<String>,
    pub role: Option<String>,
}

/// 备注返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDto {
    pub id: String,
    pub title: String,
    pub content: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// 备注创建请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    pub title: String,
    pub content: String,
}

/// 备注更新请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

// ============================================================================
// 指标
// ============================================================================

/// Telemetry 指标快照（聚合计数）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub sms_received: u64,
    pub sms_persisted: u64,
    pub hangups_received: u64,
    pub hangups_persisted: u64,
    pub persist_failures: u64,
    pub sends_requested: u64,
    pub sends_succeeded: u64,
    pub sends_failed: u64,
    pub scans_requested: u64,
    pub broadcasts: u64,
    pub agent_connects: u64,
    pub agent_disconnects: u64,
}
