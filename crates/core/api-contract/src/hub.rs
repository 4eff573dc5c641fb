//! 实时集线器的命名消息协议。
//!
//! 三个方向各一个带类型标签的枚举：
//! - `AgentToServer`：边缘 Agent 上行
//! - `ServerToAgent`：服务端下发命令
//! - `ServerToClient`：服务端对浏览器客户端广播
//!
//! 线格式为 `{"type": "<消息名>", ...lowerCamelCase 字段}`，与 HTTP DTO
//! 保持同一命名约定。未知消息由接收方记录日志后跳过。

use crate::{
    CallHangupDto, CallHangupEventDto, ListenPortDto, PortInfoDto, ScanResultDto, SmsMessageDto,
    SmsReceivedDto,
};
use serde::{Deserialize, Serialize};

/// Agent → 服务端。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum AgentToServer {
    /// 连接（或重连）后声明自身 DeviceId。
    RegisterDevice { device_id: String },
    /// 扫描命令确认。
    SendScanAcknowledgment { device_id: String, message: String },
    /// 增量上报单个端口（每个端口会出现两次：识别后与详情补全后）。
    SendComPortFound { device_id: String, port: PortInfoDto },
    /// 扫描完成后的全量结果。
    SendComPortScanResult {
        device_id: String,
        result: ScanResultDto,
    },
    /// 扫描完成时间（ISO 8601）。
    SendComPortScanCompleted {
        device_id: String,
        completed_at: String,
    },
    /// 收到短信。
    SendSmsReceived {
        device_id: String,
        sms: SmsReceivedDto,
    },
    /// 来电挂断事件。
    SendCallHangupRecord {
        device_id: String,
        hangup: CallHangupEventDto,
    },
    /// 发送事务结果（status 为 `Success` 或 `Failed`）。
    SendSmsResult {
        record_id: String,
        status: String,
        error: Option<String>,
    },
}

/// 服务端 → Agent。`device_id` 为空串时表示不限定目标设备。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerToAgent {
    ScanComPorts {
        device_id: String,
    },
    StartSmsReceiver {
        device_id: String,
        ports: Vec<ListenPortDto>,
    },
    StopSmsReceiver {
        device_id: String,
    },
    SendSms {
        device_id: String,
        com_port: String,
        target_number: String,
        message_content: String,
        record_id: String,
    },
}

/// 服务端 → 浏览器客户端广播。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerToClient {
    DeviceConnected {
        device_id: String,
    },
    DeviceDisconnected {
        device_id: String,
    },
    ComPortFound {
        device_id: String,
        port: PortInfoDto,
    },
    ComPortScanCompleted {
        device_id: String,
        completed_at: String,
    },
    SmsReceived {
        device_id: String,
        sms: serde_json::Value,
    },
    CallHangupRecord {
        device_id: String,
        hangup: serde_json::Value,
    },
    SmsSendResult {
        record_id: String,
        status: String,
        error: Option<String>,
    },
}

impl ServerToClient {
    /// 持久化成功后的短信广播（携带含 id 的完整行）。
    pub fn sms_received(device_id: String, sms: &SmsMessageDto) -> ServerToClient {
        ServerToClient::SmsReceived {
            device_id,
            sms: serde_json::to_value(sms).unwrap_or(serde_json::Value::Null),
        }
    }

    /// 持久化成功后的挂断广播。
    pub fn call_hangup(device_id: String, hangup: &CallHangupDto) -> ServerToClient {
        ServerToClient::CallHangupRecord {
            device_id,
            hangup: serde_json::to_value(hangup).unwrap_or(serde_json::Value::Null),
        }
    }
}
