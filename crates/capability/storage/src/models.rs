//! 数据模型
//!
//! 定义所有存储相关的数据模型：
//! - 用户模型：UserRecord, UserUpdate
//! - COM 分配模型：ComAllocationRecord, ComAllocationUpdate
//! - 设备快照模型：DeviceComSnapshotRecord（ports 以 JSON 存于 data_json）
//! - 短信模型：SmsMessageRecord
//! - 挂断记录模型：CallHangupRecord
//! - 已读回执模型：MessageReadReceiptRecord, ReceiptWriteResult
//! - 发送记录模型：SmsSendRecord
//! - 备注模型：NoteRecord, NoteUpdate
//!
//! 约定：主键为 UUID 字符串，时间戳为 UTC，软删除用 is_deleted 标记。

use chrono::{DateTime, Utc};

/// 消息类型（已读回执的维度）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Sms,
    Hangup,
}

impl MessageType {
    /// 从请求字符串解析，大小写不敏感。
    pub fn parse(value: &str) -> Option<MessageType> {
        match value.to_ascii_lowercase().as_str() {
            "sms" => Some(MessageType::Sms),
            "hangup" => Some(MessageType::Hangup),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Sms => "Sms",
            MessageType::Hangup => "Hangup",
        }
    }
}

/// 用户记录。口令以 argon2 PHC 串存储（盐内嵌）。
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub user_name: String,
    pub password_hash: String,
    pub role: String,
    pub is_deleted: bool,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// 用户更新输入。
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub password_hash: Option<String>,
    pub role: Option<String>,
}

/// COM 分配记录：授予 user_id 对 (device_id, com_ports) 的可见性。
#[derive(Debug, Clone)]
pub struct ComAllocationRecord {
    pub id: String,
    pub user_id: String,
    pub device_id: String,
    pub com_ports: Vec<String>,
    pub is_deleted: bool,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// COM 分配更新输入。
#[derive(Debug, Clone)]
pub struct ComAllocationUpdate {
    pub device_id: Option<String>,
    pub com_ports: Option<Vec<String>>,
}

/// 设备快照记录。每个设备至多一条，写入为覆盖语义。
///
/// `data_json` 为 PortInfo 数组的 JSON 文本，结构见 api-contract。
#[derive(Debug, Clone)]
pub struct DeviceComSnapshotRecord {
    pub device_id: String,
    pub data_json: String,
    pub updated_time: DateTime<Utc>,
}

/// 短信记录。`operator` 在入库时由快照补全，之后不再回填。
#[derive(Debug, Clone)]
pub struct SmsMessageRecord {
    pub id: String,
    pub device_id: String,
    pub com_port: String,
    pub sender_number: String,
    pub message_content: String,
    pub received_time: DateTime<Utc>,
    pub sms_timestamp: Option<String>,
    pub operator: Option<String>,
    pub is_deleted: bool,
}

/// 来电挂断记录。reason 为 AutoHangup | Manual | Unknown。
#[derive(Debug, Clone)]
pub struct CallHangupRecord {
    pub id: String,
    pub device_id: String,
    pub com_port: String,
    pub caller_number: Option<String>,
    pub hangup_time: DateTime<Utc>,
    pub reason: String,
    pub raw_line: Option<String>,
    pub is_deleted: bool,
}

/// 已读回执记录。(user_id, message_type, source_id) 唯一。
#[derive(Debug, Clone)]
pub struct MessageReadReceiptRecord {
    pub id: String,
    pub user_id: String,
    pub message_type: MessageType,
    pub source_id: String,
    pub read_time: DateTime<Utc>,
}

/// 回执写入结果：重复写入时 inserted 为 false，调用视为成功。
#[derive(Debug)]
pub struct ReceiptWriteResult {
    pub record: MessageReadReceiptRecord,
    pub inserted: bool,
}

/// 短信发送记录。status 为 Pending | Success | Failed。
#[derive(Debug, Clone)]
pub struct SmsSendRecord {
    pub id: String,
    pub device_id: String,
    pub com_port: String,
    pub target_number: String,
    pub message_content: String,
    pub status: String,
    pub error_message: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// 备注记录。
#[derive(Debug, Clone)]
pub struct NoteRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub is_deleted: bool,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// 备注更新输入。
#[derive(Debug, Clone)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
}
