//! 串口驱动的领域类型。
//!
//! 这些类型由 Agent 映射到 api-contract 的 DTO 后上报；驱动层本身
//! 不感知 deviceId。

use chrono::{DateTime, Utc};
use std::time::Duration;

/// 调制解调器详情。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModemInfo {
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

/// 单个端口的扫描结果。
#[derive(Debug, Clone, PartialEq)]
pub struct PortInfo {
    pub port_name: String,
    pub is_available: bool,
    pub is_sms_modem: bool,
    pub baud_rate: Option<u32>,
    pub modem_info: Option<ModemInfo>,
    /// 探测阶段收到的原始响应（排障用）。
    pub raw: Option<String>,
}

/// 全量扫描结果。
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub scan_time: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    pub ports: Vec<PortInfo>,
}

/// 接收监听的端口描述。
#[derive(Debug, Clone)]
pub struct ListenPort {
    pub port_name: String,
    pub baud_rate: u32,
}

/// 收到的短信事件。
#[derive(Debug, Clone)]
pub struct SmsReceived {
    pub com_port: String,
    pub sender_number: String,
    pub message_content: String,
    pub received_time: DateTime<Utc>,
    /// 模块原始时间戳串（`YY/MM/DD,HH:MM:SS±TZ`）。
    pub sms_timestamp: Option<String>,
}

/// 挂断原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HangupReason {
    AutoHangup,
    Manual,
    Unknown,
}

impl HangupReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            HangupReason::AutoHangup => "AutoHangup",
            HangupReason::Manual => "Manual",
            HangupReason::Unknown => "Unknown",
        }
    }
}

/// 来电挂断事件。
#[derive(Debug, Clone)]
pub struct CallHangup {
    pub com_port: String,
    pub caller_number: Option<String>,
    pub hangup_time: DateTime<Utc>,
    pub reason: HangupReason,
    /// 触发时缓冲尾部与最后一个数据块（各自截断）。
    pub raw_line: Option<String>,
}

/// 来电自动挂断策略。
#[derive(Debug, Clone)]
pub struct HangupPolicy {
    pub enabled: bool,
    pub hangup_delay: Duration,
    pub cooldown: Duration,
    /// 主叫号码子串白名单，大小写不敏感，命中不挂断。
    pub whitelist: Vec<String>,
}

impl Default for HangupPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            hangup_delay: Duration::from_millis(200),
            cooldown: Duration::from_secs(5),
            whitelist: Vec::new(),
        }
    }
}

impl HangupPolicy {
    /// 主叫是否命中白名单。
    pub fn is_whitelisted(&self, caller: &str) -> bool {
        let caller = caller.to_ascii_lowercase();
        self.whitelist
            .iter()
            .any(|entry| !entry.is_empty() && caller.contains(&entry.to_ascii_lowercase()))
    }
}

/// 发送事务结果。仅做一次 AT 层尝试，如实报告结局。
#[derive(Debug, Clone)]
pub struct SendReport {
    pub success: bool,
    /// `+CMGS: <mr>` 中的消息引用号（日志用）。
    pub message_reference: Option<String>,
    pub error: Option<String>,
}

impl SendReport {
    pub fn ok(message_reference: Option<String>) -> Self {
        Self {
            success: true,
            message_reference,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_reference: None,
            error: Some(error.into()),
        }
    }
}
