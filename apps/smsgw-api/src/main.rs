//! 服务端入口：装配存储、认证、实时集线器与 HTTP 路由。

mod handlers;
mod hub;
mod middleware;
mod routes;
mod utils;
mod visibility;

use hub::HubState;
use smsgw_auth::{AuthService, JwtManager};
use smsgw_config::ServerConfig;
use smsgw_storage::{
    CallHangupStore, ComAllocationStore, NoteStore, PgCallHangupStore, PgComAllocationStore,
    PgNoteStore, PgReadReceiptStore, PgSendRecordStore, PgSmsMessageStore, PgSnapshotStore,
    PgUserStore, ReadReceiptStore, RedisRefreshTokenStore, SendRecordStore, SmsMessageStore,
    SnapshotStore, UserStore, connect_pool,
};
use smsgw_telemetry::init_tracing;
use std::sync::Arc;
use tracing::info;

/// 应用状态：各存储与集线器经 Arc 注入 handlers。
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub user_store: Arc<dyn UserStore>,
    pub allocation_store: Arc<dyn ComAllocationStore>,
    pub snapshot_store: Arc<dyn SnapshotStore>,
    pub sms_store: Arc<dyn SmsMessageStore>,
    pub hangup_store: Arc<dyn CallHangupStore>,
    pub receipt_store: Arc<dyn ReadReceiptStore>,
    pub send_store: Arc<dyn SendRecordStore>,
    pub note_store: Arc<dyn NoteStore>,
    pub hub: Arc<HubState>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;
    init_tracing();

    // Postgres 存储（需先执行 migrations/seed）
    let pool = connect_pool(&config.database_url).await?;
    let user_store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
    let allocation_store: Arc<dyn ComAllocationStore> =
        Arc::new(PgComAllocationStore::new(pool.clone()));
    let snapshot_store: Arc<dyn SnapshotStore> = Arc::new(PgSnapshotStore::new(pool.clone()));
    let sms_store: Arc<dyn SmsMessageStore> = Arc::new(PgSmsMessageStore::new(pool.clone()));
    let hangup_store: Arc<dyn CallHangupStore> = Arc::new(PgCallHangupStore::new(pool.clone()));
    let receipt_store: Arc<dyn ReadReceiptStore> = Arc::new(PgReadReceiptStore::new(pool.clone()));
    let send_store: Arc<dyn SendRecordStore> = Arc::new(PgSendRecordStore::new(pool.clone()));
    let note_store: Arc<dyn NoteStore> = Arc::new(PgNoteStore::new(pool));

    // Redis 只承载 refresh token
    let refresh_store = Arc::new(RedisRefreshTokenStore::connect(&config.redis_url)?);
    let jwt = JwtManager::new(
        config.jwt_secret.clone(),
        config.jwt_access_ttl_seconds,
        config.jwt_refresh_ttl_seconds,
    );
    let auth = Arc::new(AuthService::new(
        user_store.clone(),
        refresh_store,
        jwt,
        config.jwt_refresh_ttl_seconds,
    ));

    let hub = Arc::new(HubState::new(
        snapshot_store.clone(),
        sms_store.clone(),
        hangup_store.clone(),
        send_store.clone(),
    ));

    let state = AppState {
        auth,
        user_store,
        allocation_store,
        snapshot_store,
        sms_store,
        hangup_store,
        receipt_store,
        send_store,
        note_store,
        hub,
    };

    let app = routes::create_api_router()
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::request_context));

    info!(addr = %config.http_addr, "smsgw api listening");
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
