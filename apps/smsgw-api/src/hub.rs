//! 实时集线器
//!
//! 维护两类持久连接：
//! - Agent（`/hub/agent`）：注册 DeviceId，接收服务端命令，上行事件
//! - 浏览器客户端（`/hub/client`）：只收广播
//!
//! 状态为进程内 connection_id → device_id 映射；多实例部署需要共享
//! 在线表（deviceId → instanceId/connectionId + 发布订阅路由），此处
//! 留作扩展点。
//!
//! 入库先于广播：短信/挂断事件先持久化（失败仅记日志与指标），再对
//! 全部客户端广播，客户端因此只会看到已落盘的事件。每个客户端连接
//! 独享一条 mpsc 队列，同一来源的两次广播按 FIFO 送达。

use api_contract::hub::{AgentToServer, ServerToAgent, ServerToClient};
use api_contract::{CallHangupDto, PortInfoDto, SmsMessageDto};
use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use smsgw_storage::{
    CallHangupRecord, CallHangupStore, DeviceComSnapshotRecord, SendRecordStore, SmsMessageRecord,
    SmsMessageStore, SnapshotStore,
};
use smsgw_telemetry::{
    record_agent_connect, record_agent_disconnect, record_broadcast, record_hangup_persisted,
    record_hangup_received, record_persist_failure, record_sms_persisted, record_sms_received,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

struct AgentConnection {
    device_id: String,
    tx: mpsc::UnboundedSender<Message>,
}

/// 集线器状态。
pub struct HubState {
    next_connection_id: AtomicU64,
    agents: RwLock<HashMap<u64, AgentConnection>>,
    clients: RwLock<HashMap<u64, mpsc::UnboundedSender<Message>>>,
    snapshot_store: Arc<dyn SnapshotStore>,
    sms_store: Arc<dyn SmsMessageStore>,
    hangup_store: Arc<dyn CallHangupStore>,
    send_store: Arc<dyn SendRecordStore>,
}

impl HubState {
    pub fn new(
        snapshot_store: Arc<dyn SnapshotStore>,
        sms_store: Arc<dyn SmsMessageStore>,
        hangup_store: Arc<dyn CallHangupStore>,
        send_store: Arc<dyn SendRecordStore>,
    ) -> Self {
        Self {
            next_connection_id: AtomicU64::new(1),
            agents: RwLock::new(HashMap::new()),
            clients: RwLock::new(HashMap::new()),
            snapshot_store,
            sms_store,
            hangup_store,
            send_store,
        }
    }

    /// 当前在线设备（去重、排序、大小写不敏感）。
    pub async fn connected_device_ids(&self) -> Vec<String> {
        let agents = self.agents.read().await;
        let mut ids: Vec<String> = agents
            .values()
            .filter(|agent| !agent.device_id.is_empty())
            .map(|agent| agent.device_id.clone())
            .collect();
        ids.sort_by_key(|id| id.to_lowercase());
        ids.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        ids
    }

    /// 向指定设备的 Agent 下发扫描命令。
    pub async fn request_com_port_scan(&self, device_id: &str) -> bool {
        self.send_to_device(
            device_id,
            ServerToAgent::ScanComPorts {
                device_id: device_id.to_string(),
            },
        )
        .await
    }

    /// 向指定设备的 Agent 下发启动监听命令。
    pub async fn request_start_receiver(
        &self,
        device_id: &str,
        ports: Vec<api_contract::ListenPortDto>,
    ) -> bool {
        self.send_to_device(
            device_id,
            ServerToAgent::StartSmsReceiver {
                device_id: device_id.to_string(),
                ports,
            },
        )
        .await
    }

    /// 向指定设备的 Agent 下发停止监听命令。
    pub async fn request_stop_receiver(&self, device_id: &str) -> bool {
        self.send_to_device(
            device_id,
            ServerToAgent::StopSmsReceiver {
                device_id: device_id.to_string(),
            },
        )
        .await
    }

    /// 向指定设备的 Agent 下发发送命令。
    pub async fn request_send_sms(
        &self,
        device_id: &str,
        com_port: &str,
        target_number: &str,
        message_content: &str,
        record_id: &str,
    ) -> bool {
        self.send_to_device(
            device_id,
            ServerToAgent::SendSms {
                device_id: device_id.to_string(),
                com_port: com_port.to_string(),
                target_number: target_number.to_string(),
                message_content: message_content.to_string(),
                record_id: record_id.to_string(),
            },
        )
        .await
    }

    async fn send_to_device(&self, device_id: &str, command: ServerToAgent) -> bool {
        let agents = self.agents.read().await;
        let Some(agent) = agents
            .values()
            .find(|agent| agent.device_id.eq_ignore_ascii_case(device_id))
        else {
            warn!(device_id, "no connected agent for device");
            return false;
        };
        let payload = match serde_json::to_string(&command) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "command serialization failed");
                return false;
            }
        };
        agent.tx.send(Message::Text(payload.into())).is_ok()
    }

    /// 对全部客户端连接广播。
    pub async fn broadcast(&self, event: ServerToClient) {
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "broadcast serialization failed");
                return;
            }
        };
        let clients = self.clients.read().await;
        for tx in clients.values() {
            let _ = tx.send(Message::Text(payload.clone().into()));
        }
        record_broadcast();
    }

    fn next_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    // -- Agent 消息处理 ----------------------------------------------------

    async fn handle_agent_message(&self, connection_id: u64, message: AgentToServer) {
        match message {
            AgentToServer::RegisterDevice { device_id } => {
                self.register_device(connection_id, device_id).await;
            }
            AgentToServer::SendScanAcknowledgment { device_id, message } => {
                info!(device_id = %device_id, message = %message, "scan acknowledged");
            }
            AgentToServer::SendComPortFound { device_id, port } => {
                self.broadcast(ServerToClient::ComPortFound { device_id, port })
                    .await;
            }
            AgentToServer::SendComPortScanResult { device_id, result } => {
                self.persist_snapshot(&device_id, result.ports).await;
            }
            AgentToServer::SendComPortScanCompleted {
                device_id,
                completed_at,
            } => {
                self.broadcast(ServerToClient::ComPortScanCompleted {
                    device_id,
                    completed_at,
                })
                .await;
            }
            AgentToServer::SendSmsReceived { device_id, sms } => {
                record_sms_received();
                let record = SmsMessageRecord {
                    id: Uuid::new_v4().to_string(),
                    device_id: device_id.clone(),
                    com_port: sms.com_port.clone(),
                    sender_number: sms.sender_number.clone(),
                    message_content: sms.message_content.clone(),
                    received_time: sms.received_time,
                    sms_timestamp: sms.sms_timestamp.clone(),
                    operator: self.lookup_operator(&device_id, &sms.com_port).await,
                    is_deleted: false,
                };
                // 入库失败不阻断广播
                let persisted = match self.sms_store.insert_message(record.clone()).await {
                    Ok(record) => {
                        record_sms_persisted();
                        record
                    }
                    Err(err) => {
                        record_persist_failure();
                        warn!(device_id = %device_id, error = %err, "sms persist failed");
                        record
                    }
                };
                let dto = sms_record_to_dto(&persisted);
                self.broadcast(ServerToClient::sms_received(device_id, &dto))
                    .await;
            }
            AgentToServer::SendCallHangupRecord { device_id, hangup } => {
                record_hangup_received();
                let record = CallHangupRecord {
                    id: Uuid::new_v4().to_string(),
                    device_id: device_id.clone(),
                    com_port: hangup.com_port.clone(),
                    caller_number: hangup.caller_number.clone(),
                    hangup_time: hangup.hangup_time,
                    reason: hangup.reason.clone(),
                    raw_line: hangup.raw_line.clone(),
                    is_deleted: false,
                };
                // comPort 为空的事件只广播不入库
                if record.com_port.trim().is_empty() {
                    debug!(device_id = %device_id, "hangup without com port, not persisted");
                } else {
                    match self.hangup_store.insert_record(record.clone()).await {
                        Ok(_) => record_hangup_persisted(),
                        Err(err) => {
                            record_persist_failure();
                            warn!(device_id = %device_id, error = %err, "hangup persist failed");
                        }
                    }
                }
                let dto = hangup_record_to_dto(&record);
                self.broadcast(ServerToClient::call_hangup(device_id, &dto))
                    .await;
            }
            AgentToServer::SendSmsResult {
                record_id,
                status,
                error,
            } => {
                match self
                    .send_store
                    .update_status(&record_id, &status, error.as_deref())
                    .await
                {
                    Ok(Some(_)) => {}
                    Ok(None) => warn!(record_id = %record_id, "send record not found"),
                    Err(err) => {
                        record_persist_failure();
                        warn!(record_id = %record_id, error = %err, "send record update failed");
                    }
                }
                self.broadcast(ServerToClient::SmsSendResult {
                    record_id,
                    status,
                    error,
                })
                .await;
            }
        }
    }

    async fn register_device(&self, connection_id: u64, device_id: String) {
        {
            let mut agents = self.agents.write().await;
            if let Some(agent) = agents.get_mut(&connection_id) {
                agent.device_id = device_id.clone();
            }
        }
        record_agent_connect();
        info!(device_id = %device_id, connection_id, "device registered");
        self.broadcast(ServerToClient::DeviceConnected { device_id })
            .await;
    }

    /// 扫描完成：覆盖写入设备快照（端口里的 deviceId 统一为上报设备）。
    async fn persist_snapshot(&self, device_id: &str, mut ports: Vec<PortInfoDto>) {
        for port in &mut ports {
            port.device_id = device_id.to_string();
        }
        let data_json = match serde_json::to_string(&ports) {
            Ok(data_json) => data_json,
            Err(err) => {
                warn!(device_id, error = %err, "snapshot serialization failed");
                return;
            }
        };
        let record = DeviceComSnapshotRecord {
            device_id: device_id.to_string(),
            data_json,
            updated_time: Utc::now(),
        };
        match self.snapshot_store.upsert_snapshot(record).await {
            Ok(_) => info!(device_id, ports = ports.len(), "device snapshot updated"),
            Err(err) => {
                record_persist_failure();
                warn!(device_id, error = %err, "snapshot persist failed");
            }
        }
    }

    /// 入库时从快照补全运营商；快照可能滞后，入库后不再回填。
    async fn lookup_operator(&self, device_id: &str, com_port: &str) -> Option<String> {
        let snapshot = self.snapshot_store.find_snapshot(device_id).await.ok()??;
        let ports: Vec<PortInfoDto> = serde_json::from_str(&snapshot.data_json).ok()?;
        ports
            .iter()
            .find(|port| port.port_name.eq_ignore_ascii_case(com_port))
            .and_then(|port| port.modem_info.as_ref())
            .and_then(|info| info.operator.clone())
    }

    async fn disconnect(&self, connection_id: u64) {
        let device_id = {
            let mut agents = self.agents.write().await;
            agents.remove(&connection_id).map(|agent| agent.device_id)
        };
        if let Some(device_id) = device_id {
            record_agent_disconnect();
            if !device_id.is_empty() {
                info!(device_id = %device_id, connection_id, "device disconnected");
                self.broadcast(ServerToClient::DeviceDisconnected { device_id })
                    .await;
            }
        }
    }
}

/// SmsMessageRecord → 广播 DTO（isRead 按接收方各自计算，这里恒 false）。
pub fn sms_record_to_dto(record: &SmsMessageRecord) -> SmsMessageDto {
    SmsMessageDto {
        id: record.id.clone(),
        device_id: record.device_id.clone(),
        com_port: record.com_port.clone(),
        sender_number: record.sender_number.clone(),
        message_content: record.message_content.clone(),
        received_time: record.received_time,
        sms_timestamp: record.sms_timestamp.clone(),
        operator: record.operator.clone(),
        is_deleted: record.is_deleted,
        is_read: false,
    }
}

/// CallHangupRecord → 广播 DTO。
pub fn hangup_record_to_dto(record: &CallHangupRecord) -> CallHangupDto {
    CallHangupDto {
        id: record.id.clone(),
        device_id: record.device_id.clone(),
        com_port: record.com_port.clone(),
        caller_number: record.caller_number.clone(),
        hangup_time: record.hangup_time,
        reason: record.reason.clone(),
        raw_line: record.raw_line.clone(),
        is_deleted: record.is_deleted,
        is_read: false,
    }
}

// ---------------------------------------------------------------------------
// WebSocket 连接处理
// ---------------------------------------------------------------------------

/// Agent 连接：读取上行消息并分发；写端由独立任务泵出命令队列。
pub async fn run_agent_socket(hub: Arc<HubState>, socket: WebSocket) {
    let connection_id = hub.next_id();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    {
        let mut agents = hub.agents.write().await;
        agents.insert(
            connection_id,
            AgentConnection {
                device_id: String::new(),
                tx,
            },
        );
    }
    debug!(connection_id, "agent socket connected");

    let (mut sink, mut stream) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<AgentToServer>(&text) {
                Ok(parsed) => hub.handle_agent_message(connection_id, parsed).await,
                Err(err) => {
                    // 畸形消息跳过，不中断连接
                    warn!(connection_id, error = %err, "agent message parse failed");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(connection_id, error = %err, "agent socket read error");
                break;
            }
        }
    }

    writer.abort();
    hub.disconnect(connection_id).await;
}


/// 客户端连接：只收广播；入站消息除 Close 外忽略。
pub async fn run_client_socket(hub: Arc<HubState>, socket: WebSocket) {
    let connection_id = hub.next_id();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    {
        let mut clients = hub.clients.write().await;
        clients.insert(connection_id, tx);
    }
    debug!(connection_id, "client socket connected");

    let (mut sink, mut stream) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    writer.abort();
    hub.clients.write().await.remove(&connection_id);
    debug!(connection_id, "client socket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_contract::SmsReceivedDto;
    use chrono::TimeZone;
    use smsgw_storage::{
        AccessScope, InMemoryCallHangupStore, InMemorySendRecordStore, InMemorySmsMessageStore,
        InMemorySnapshotStore, PageRequest, SmsMessageQuery,
    };

    fn hub_with_stores() -> (Arc<HubState>, Arc<InMemorySmsMessageStore>, Arc<InMemorySnapshotStore>)
    {
        let snapshot_store = Arc::new(InMemorySnapshotStore::new());
        let sms_store = Arc::new(InMemorySmsMessageStore::new());
        let hub = Arc::new(HubState::new(
            snapshot_store.clone(),
            sms_store.clone(),
            Arc::new(InMemoryCallHangupStore::new()),
            Arc::new(InMemorySendRecordStore::new()),
        ));
        (hub, sms_store, snapshot_store)
    }

    async fn attach_agent(hub: &HubState, device_id: &str) -> mpsc::UnboundedReceiver<Message> {
        let connection_id = hub.next_id();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.agents.write().await.insert(
            connection_id,
            AgentConnection {
                device_id: device_id.to_string(),
                tx,
            },
        );
        rx
    }

    async fn attach_client(hub: &HubState) -> mpsc::UnboundedReceiver<Message> {
        let connection_id = hub.next_id();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.clients.write().await.insert(connection_id, tx);
        rx
    }

    fn text_payload(message: Message) -> serde_json::Value {
        match message {
            Message::Text(text) => serde_json::from_str(&text).expect("json payload"),
            other => panic!("unexpected ws message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn connected_ids_are_distinct_sorted_case_insensitive() {
        let (hub, _, _) = hub_with_stores();
        let _a = attach_agent(&hub, "rig-B").await;
        let _b = attach_agent(&hub, "RIG-b").await;
        let _c = attach_agent(&hub, "rig-a").await;
        let ids = hub.connected_device_ids().await;
        assert_eq!(ids.len(), 2);
        assert!(ids[0].eq_ignore_ascii_case("rig-a"));
        assert!(ids[1].eq_ignore_ascii_case("rig-b"));
    }

    #[tokio::test]
    async fn command_routing_targets_single_agent() {
        let (hub, _, _) = hub_with_stores();
        let mut rx = attach_agent(&hub, "rig-1").await;
        assert!(hub.request_com_port_scan("RIG-1").await);
        assert!(!hub.request_com_port_scan("rig-unknown").await);

        let payload = text_payload(rx.recv().await.expect("command"));
        assert_eq!(payload["type"], "ScanComPorts");
        assert_eq!(payload["deviceId"], "RIG-1");
    }

    #[tokio::test]
    async fn sms_ingest_persists_before_broadcast_and_enriches_operator() {
        let (hub, sms_store, snapshot_store) = hub_with_stores();
        // 预置快照：COM3 带运营商
        snapshot_store
            .upsert_snapshot(smsgw_storage::DeviceComSnapshotRecord {
                device_id: "rig-1".to_string(),
                data_json: r#"[{"deviceId":"rig-1","portName":"COM3","isAvailable":true,"isSmsModem":true,"baudRate":115200,"modemInfo":{"hasSimCard":true,"iccid":null,"operator":"CMCC","signalStrength":24,"signalQuality":"Good","phoneNumber":null,"manufacturer":null,"model":null,"firmware":null,"imei":null,"simStatus":null,"networkStatus":null},"raw":null}]"#.to_string(),
                updated_time: Utc::now(),
            })
            .await
            .expect("seed snapshot");

        let mut client_rx = attach_client(&hub).await;
        let received_time = Utc.with_ymd_and_hms(2026, 1, 23, 14, 30, 45).unwrap();
        hub.handle_agent_message(
            999,
            AgentToServer::SendSmsReceived {
                device_id: "rig-1".to_string(),
                sms: SmsReceivedDto {
                    device_id: "rig-1".to_string(),
                    com_port: "COM3".to_string(),
                    sender_number: "+8613800138000".to_string(),
                    message_content: "你你".to_string(),
                    received_time,
                    sms_timestamp: Some("26/01/23,14:30:45+32".to_string()),
                },
            },
        )
        .await;

        // 入库行带运营商
        let page = sms_store
            .query_messages(
                &AccessScope::admin(false),
                &SmsMessageQuery::default(),
                PageRequest::default(),
            )
            .await
            .expect("query");
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].operator.as_deref(), Some("CMCC"));
        assert_eq!(page.data[0].message_content, "你你");

        // 广播携带入库后的完整行
        let payload = text_payload(client_rx.recv().await.expect("broadcast"));
        assert_eq!(payload["type"], "SmsReceived");
        assert_eq!(payload["deviceId"], "rig-1");
        assert_eq!(payload["sms"]["comPort"], "COM3");
        assert_eq!(payload["sms"]["operator"], "CMCC");
        assert_eq!(payload["sms"]["id"], page.data[0].id);
        assert_eq!(payload["sms"]["receivedTime"], "2026-01-23T14:30:45Z");
    }

    #[tokio::test]
    async fn hangup_without_port_broadcasts_but_does_not_persist() {
        let hangup_store = Arc::new(InMemoryCallHangupStore::new());
        let hub = Arc::new(HubState::new(
            Arc::new(InMemorySnapshotStore::new()),
            Arc::new(InMemorySmsMessageStore::new()),
            hangup_store.clone(),
            Arc::new(InMemorySendRecordStore::new()),
        ));
        let mut client_rx = attach_client(&hub).await;

        hub.handle_agent_message(
            7,
            AgentToServer::SendCallHangupRecord {
                device_id: "rig-1".to_string(),
                hangup: api_contract::CallHangupEventDto {
                    device_id: "rig-1".to_string(),
                    com_port: "".to_string(),
                    caller_number: Some("+16660002222".to_string()),
                    hangup_time: Utc::now(),
                    reason: "AutoHangup".to_string(),
                    raw_line: None,
                },
            },
        )
        .await;

        let payload = text_payload(client_rx.recv().await.expect("broadcast"));
        assert_eq!(payload["type"], "CallHangupRecord");

        let page = hangup_store
            .query_records(
                &AccessScope::admin(true),
                &smsgw_storage::CallHangupQuery::default(),
                PageRequest::default(),
            )
            .await
            .expect("query");
        assert_eq!(page.total_count, 0);
    }

    #[tokio::test]
    async fn disconnect_notifies_clients() {
        let (hub, _, _) = hub_with_stores();
        let connection_id = hub.next_id();
        let (tx, _agent_rx) = mpsc::unbounded_channel();
        hub.agents.write().await.insert(
            connection_id,
            AgentConnection {
                device_id: "rig-1".to_string(),
                tx,
            },
        );
        let mut client_rx = attach_client(&hub).await;

        hub.disconnect(connection_id).await;
        let payload = text_payload(client_rx.recv().await.expect("broadcast"));
        assert_eq!(payload["type"], "DeviceDisconnected");
        assert_eq!(payload["deviceId"], "rig-1");
        assert!(hub.connected_device_ids().await.is_empty());
    }
}
