//! 路由定义
//!
//! 集中管理所有 API 路由，将路径映射到对应的 handlers。
//! 路由包括：
//! - 健康检查与指标：/health, /metrics
//! - 认证接口：/users/login, /users/refresh
//! - 设备与集线器：/device/*, /hub/agent, /hub/client
//! - 短信：/smsmessages/*
//! - 挂断记录：/call-hangup-records/*
//! - 已读回执：/message-read/*
//! - COM 分配：/com-allocations/*
//! - 用户：/users/*
//! - 备注：/notes/*

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{delete, get, post},
};

/// 创建 API 路由
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/users/login", post(login))
        .route("/users/refresh", post(refresh_token))
        .route("/hub/agent", get(agent_hub))
        .route("/hub/client", get(client_hub))
        .route("/device/connected", get(connected_devices))
        .route("/device/scan-com-ports/{device_id}", post(scan_com_ports))
        .route(
            "/device/com-snapshot/{device_id}",
            get(get_snapshot).post(upsert_snapshot),
        )
        .route(
            "/device/start-sms-receiver/{device_id}",
            post(start_sms_receiver),
        )
        .route(
            "/device/stop-sms-receiver/{device_id}",
            post(stop_sms_receiver),
        )
        .route("/device/send-sms", post(send_sms))
        .route("/smsmessages", get(list_sms_messages))
        .route("/smsmessages/admin/all", get(list_sms_messages_admin))
        .route("/smsmessages/{id}", delete(soft_delete_sms))
        .route("/smsmessages/admin/hard-delete/{id}", delete(hard_delete_sms))
        .route("/call-hangup-records", get(list_hangups))
        .route("/call-hangup-records/admin/all", get(list_hangups_admin))
        .route("/call-hangup-records/{id}", delete(soft_delete_hangup))
        .route(
            "/call-hangup-records/admin/hard-delete/{id}",
            delete(hard_delete_hangup),
        )
        .route("/message-read/mark-read", post(mark_read))
        .route("/message-read/mark-all-read", post(mark_all_read))
        .route("/message-read/unread-counts", get(unread_counts))
        .route("/com-allocations", get(list_allocations).post(create_allocation))
        .route(
            "/com-allocations/{id}",
            get(get_allocation)
                .put(update_allocation)
                .delete(delete_allocation),
        )
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/notes", get(list_notes).post(create_note))
        .route(
            "/notes/{id}",
            get(get_note).put(update_note).delete(delete_note),
        )
}
