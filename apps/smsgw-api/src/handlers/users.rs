//! 用户 CRUD handlers（管理员）。
//!
//! - 口令入库前经 argon2 散列
//! - 用户名唯一，冲突返回 409
//! - 删除为软删除，软删除用户对默认查询不可见

use crate::AppState;
use crate::middleware::require_admin;
use crate::utils::{normalize_optional, normalize_required};
use crate::utils::response::{
    bad_request_error, internal_auth_error, not_found_error, storage_error, user_to_dto,
};
use api_contract::{ApiResponse, CreateUserRequest, UpdateUserRequest, UserDto};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use domain::Role;
use smsgw_auth::hash_password;
use smsgw_storage::{UserRecord, UserUpdate};
use uuid::Uuid;

#[derive(serde::Deserialize)]
pub struct IdPath {
    id: String,
}

/// 列出全部用户。
pub async fn list_users(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    match state.user_store.list_users().await {
        Ok(items) => {
            let data: Vec<UserDto> = items.into_iter().map(user_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => storage_error(err),
    }
}

/// 获取单个用户。
pub async fn get_user(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    match state.user_store.find_by_id(&path.id).await {
        Ok(Some(item)) => {
            (StatusCode::OK, Json(ApiResponse::success(user_to_dto(item)))).into_response()
        }
        Ok(None) => not_found_error(),
        Err(err) => storage_error(err),
    }
}

/// 创建用户。用户名重复返回 409。
pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateUserRequest>,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    let user_name = match normalize_required(req.user_name, "userName") {
        Ok(value) => value,
        Err(response) => return response,
    };
    if req.password.is_empty() {
        return bad_request_error("password required");
    }
    let password_hash = match hash_password(&req.password) {
        Ok(hash) => hash,
        Err(err) => return internal_auth_error(err),
    };
    let role = Role::parse(req.role.as_deref().unwrap_or("User"));
    let now = Utc::now();
    let record = UserRecord {
        id: Uuid::new_v4().to_string(),
        user_name,
        password_hash,
        role: role.as_str().to_string(),
        is_deleted: false,
        create_time: now,
        update_time: now,
    };
    match state.user_store.create_user(record).await {
        Ok(item) => {
            (StatusCode::OK, Json(ApiResponse::success(user_to_dto(item)))).into_response()
        }
        Err(err) => storage_error(err),
    }
}

/// 更新用户（口令/角色）。
pub async fn update_user(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
    Json(req): Json<UpdateUserRequest>,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    if req.password.is_none() && req.role.is_none() {
        return bad_request_error("empty update");
    }
    let password_hash = match &req.password {
        Some(password) if password.is_empty() => return bad_request_error("password required"),
        Some(password) => match hash_password(password) {
            Ok(hash) => Some(hash),
            Err(err) => return internal_auth_error(err),
        },
        None => None,
    };
    let role = match normalize_optional(req.role, "role") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let role = role.map(|role| Role::parse(&role).as_str().to_string());
    let update = UserUpdate {
        password_hash,
        role,
    };
    match state.user_store.update_user(&path.id, update).await {
        Ok(Some(item)) => {
            (StatusCode::OK, Json(ApiResponse::success(user_to_dto(item)))).into_response()
        }
        Ok(None) => not_found_error(),
        Err(err) => storage_error(err),
    }
}

/// 软删除用户。
pub async fn delete_user(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    match state.user_store.delete_user(&path.id).await {
        Ok(true) => (StatusCode::OK, Json(ApiResponse::success(()))).into_response(),
        Ok(false) => not_found_error(),
        Err(err) => storage_error(err),
    }
}
