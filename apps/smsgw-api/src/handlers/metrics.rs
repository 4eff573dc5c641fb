//! 运行指标 handler。

use api_contract::{ApiResponse, MetricsSnapshotDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// 进程内计数器快照。
pub async fn get_metrics() -> Response {
    let snapshot = smsgw_telemetry::metrics().snapshot();
    let dto = MetricsSnapshotDto {
        sms_received: snapshot.sms_received,
        sms_persisted: snapshot.sms_persisted,
        hangups_received: snapshot.hangups_received,
        hangups_persisted: snapshot.hangups_persisted,
        persist_failures: snapshot.persist_failures,
        sends_requested: snapshot.sends_requested,
        sends_succeeded: snapshot.sends_succeeded,
        sends_failed: snapshot.sends_failed,
        scans_requested: snapshot.scans_requested,
        broadcasts: snapshot.broadcasts,
        agent_connects: snapshot.agent_connects,
        agent_disconnects: snapshot.agent_disconnects,
    };
    (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
}
