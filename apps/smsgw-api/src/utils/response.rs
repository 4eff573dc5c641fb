//! HTTP 响应辅助函数和 DTO 转换
//!
//! 提供统一的错误响应构造函数和 DTO 转换函数：
//! - 错误响应：auth_error, forbidden_error, bad_request_error,
//!   not_found_error, conflict_error, device_offline_error,
//!   internal_auth_error, storage_error
//! - DTO 转换：user_to_dto, allocation_to_dto, note_to_dto,
//!   send_record_to_dto, snapshot_to_dto
//!
//! 设计原则：
//! - 所有错误返回统一的 ApiResponse 格式
//! - HTTP 状态码与错误码对应（唯一冲突 → 409）

use api_contract::{
    ApiResponse, ComAllocationDto, DeviceComSnapshotDto, NoteDto, PortInfoDto, SmsSendRecordDto,
    UserDto, error_codes,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use smsgw_auth::AuthError;
use smsgw_storage::{
    ComAllocationRecord, DeviceComSnapshotRecord, NoteRecord, SmsSendRecord, StorageError,
    UserRecord,
};

/// 认证错误响应
pub fn auth_error(status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()>::error(
            error_codes::AUTH_UNAUTHORIZED,
            "unauthorized",
        )),
    )
        .into_response()
}

/// 禁止访问错误响应
pub fn forbidden_error() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ApiResponse::<()>::error(
            error_codes::AUTH_FORBIDDEN,
            "forbidden",
        )),
    )
        .into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(
            error_codes::INVALID_REQUEST,
            message.into(),
        )),
    )
        .into_response()
}

/// 资源未找到错误响应
pub fn not_found_error() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error(
            error_codes::RESOURCE_NOT_FOUND,
            "not found",
        )),
    )
        .into_response()
}

/// 唯一冲突错误响应（如重复的 userName）
pub fn conflict_error(message: impl Into<String>) -> Response {
    (
        StatusCode::CONFLICT,
        Json(ApiResponse::<()>::error(
            error_codes::RESOURCE_CONFLICT,
            message.into(),
        )),
    )
        .into_response()
}

/// 目标设备不在线
pub fn device_offline_error(device_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error(
            error_codes::DEVICE_OFFLINE,
            format!("device {device_id} is not connected"),
        )),
    )
        .into_response()
}

/// 认证内部错误响应
pub fn internal_auth_error(err: AuthError) -> Response {
    tracing::error!(error = ?err, "internal auth error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error(
            error_codes::INTERNAL_ERROR,
            "internal error",
        )),
    )
        .into_response()
}

/// 存储错误响应。唯一约束冲突映射为 409。
pub fn storage_error(err: StorageError) -> Response {
    if err.is_conflict() {
        return conflict_error(err.to_string());
    }
    tracing::error!(error = %err, "storage error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error(
            error_codes::INTERNAL_ERROR,
            "internal error",
        )),
    )
        .into_response()
}

/// UserRecord 转 UserDto（不携带口令散列）
pub fn user_to_dto(record: UserRecord) -> UserDto {
    UserDto {
        id: record.id,
        user_name: record.user_name,
        role: record.role,
        is_deleted: record.is_deleted,
        create_time: record.create_time,
        update_time: record.update_time,
    }
}

/// ComAllocationRecord 转 ComAllocationDto
pub fn allocation_to_dto(record: ComAllocationRecord) -> ComAllocationDto {
    ComAllocationDto {
        id: record.id,
        user_id: record.user_id,
        device_id: record.device_id,
        com_ports: record.com_ports,
    }
}

/// NoteRecord 转 NoteDto
pub fn note_to_dto(record: NoteRecord) -> NoteDto {
    NoteDto {
        id: record.id,
        title: record.title,
        content: record.content,
        create_time: record.create_time,
        update_time: record.update_time,
    }
}

/// SmsSendRecord 转 SmsSendRecordDto
pub fn send_record_to_dto(record: SmsSendRecord) -> SmsSendRecordDto {
    SmsSendRecordDto {
        id: record.id,
        device_id: record.device_id,
        com_port: record.com_port,
        target_number: record.target_number,
        status: record.status,
        error_message: record.error_message,
        create_time: record.create_time,
        update_time: record.update_time,
    }
}

/// 快照记录转 DTO。data_json 解析失败按空端口表处理。
pub fn snapshot_to_dto(record: DeviceComSnapshotRecord) -> DeviceComSnapshotDto {
    let ports: Vec<PortInfoDto> = serde_json::from_str(&record.data_json).unwrap_or_default();
    DeviceComSnapshotDto {
        device_id: record.device_id,
        ports,
        updated_time: record.updated_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;

    async fn response_json(response: Response) -> serde_json::Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn forbidden_error_contract() {
        let response = forbidden_error();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], error_codes::AUTH_FORBIDDEN);
    }

    #[tokio::test]
    async fn conflict_maps_to_409() {
        let response = storage_error(StorageError::conflict("user name already exists"));
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], error_codes::RESOURCE_CONFLICT);
    }
}
