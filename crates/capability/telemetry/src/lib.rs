//! 追踪初始化、请求 ID 生成与进程内指标计数。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
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

/// 基础指标。
pub struct TelemetryMetrics {
    sms_received: AtomicU64,
    sms_persisted: AtomicU64,
    hangups_received: AtomicU64,
    hangups_persisted: AtomicU64,
    persist_failures: AtomicU64,
    sends_requested: AtomicU64,
    sends_succeeded: AtomicU64,
    sends_failed: AtomicU64,
    scans_requested: AtomicU64,
    broadcasts: AtomicU64,
    agent_connects: AtomicU64,
    agent_disconnects: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            sms_received: AtomicU64::new(0),
            sms_persisted: AtomicU64::new(0),
            hangups_received: AtomicU64::new(0),
            hangups_persisted: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            sends_requested: AtomicU64::new(0),
            sends_succeeded: AtomicU64::new(0),
            sends_failed: AtomicU64::new(0),
            scans_requested: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            agent_connects: AtomicU64::new(0),
            agent_disconnects: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sms_received: self.sms_received.load(Ordering::Relaxed),
            sms_persisted: self.sms_persisted.load(Ordering::Relaxed),
            hangups_received: self.hangups_received.load(Ordering::Relaxed),
            hangups_persisted: self.hangups_persisted.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            sends_requested: self.sends_requested.load(Ordering::Relaxed),
            sends_succeeded: self.sends_succeeded.load(Ordering::Relaxed),
            sends_failed: self.sends_failed.load(Ordering::Relaxed),
            scans_requested: self.scans_requested.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            agent_connects: self.agent_connects.load(Ordering::Relaxed),
            agent_disconnects: self.agent_disconnects.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录 Agent 上报短信次数。
pub fn record_sms_received() {
    metrics().sms_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录短信持久化成功次数。
pub fn record_sms_persisted() {
    metrics().sms_persisted.fetch_add(1, Ordering::Relaxed);
}

/// 记录 Agent 上报挂断次数。
pub fn record_hangup_received() {
    metrics().hangups_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录挂断持久化成功次数。
pub fn record_hangup_persisted() {
    metrics().hangups_persisted.fetch_add(1, Ordering::Relaxed);
}

/// 记录入库失败次数（广播仍然照常进行）。
pub fn record_persist_failure() {
    metrics().persist_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录发送请求次数。
pub fn record_send_requested() {
    metrics().sends_requested.fetch_add(1, Ordering::Relaxed);
}

/// 记录发送成功次数。
pub fn record_send_succeeded() {
    metrics().sends_succeeded.fetch_add(1, Ordering::Relaxed);
}

/// 记录发送失败次数。
pub fn record_send_failed() {
    metrics().sends_failed.fetch_add(1, Ordering::Relaxed);
}

/// 记录扫描触发次数。
pub fn record_scan_requested() {
    metrics().scans_requested.fetch_add(1, Ordering::Relaxed);
}

/// 记录客户端广播次数（按消息计）。
pub fn record_broadcast() {
    metrics().broadcasts.fetch_add(1, Ordering::Relaxed);
}

/// 记录 Agent 连接注册次数。
pub fn record_agent_connect() {
    metrics().agent_connects.fetch_add(1, Ordering::Relaxed);
}

/// 记录 Agent 断开次数。
pub fn record_agent_disconnect() {
    metrics().agent_disconnects.fetch_add(1, Ordering::Relaxed);
}
