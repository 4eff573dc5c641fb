//! Agent 驱动装配：把串口驱动（扫描/接收/发送）桥接到集线器消息。
//!
//! 事件桥在构造时一次性挂好：驱动事件 → `AgentToServer` → 出站队列。
//! 命令处理快速返回，耗时工作（扫描、发送）进 spawn_blocking。

use api_contract::hub::AgentToServer;
use api_contract::{
    CallHangupEventDto, ModemInfoDto, PortInfoDto, ScanResultDto, SmsReceivedDto,
};
use chrono::Utc;
use smsgw_config::AgentConfig;
use smsgw_modem::{
    CallHangup, ComPortScanner, HangupPolicy, ListenPort, ModemInfo, PortInfo, ReceiverConfig,
    ReceiverEvents, ScanResult, ScannerConfig, SenderConfig, SerialOpener, SmsReceived,
    SmsReceiver, SmsSender,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

/// Agent 侧驱动持有者。
pub struct AgentDriver {
    device_id: String,
    auto_start_on_scan: bool,
    scanner: ComPortScanner,
    receiver: Arc<SmsReceiver>,
    sender: Arc<SmsSender>,
    events_tx: UnboundedSender<AgentToServer>,
}

impl AgentDriver {
    /// 构造驱动并挂接事件桥。
    pub fn new(
        config: &AgentConfig,
        opener: Arc<dyn SerialOpener>,
        events_tx: UnboundedSender<AgentToServer>,
    ) -> Arc<Self> {
        let device_id = config.device_id.clone();

        let sms_tx = events_tx.clone();
        let sms_device = device_id.clone();
        let hangup_tx = events_tx.clone();
        let hangup_device = device_id.clone();
        let events = ReceiverEvents {
            on_sms_received: Box::new(move |event: SmsReceived| {
                let _ = sms_tx.send(AgentToServer::SendSmsReceived {
                    device_id: sms_device.clone(),
                    sms: SmsReceivedDto {
                        device_id: sms_device.clone(),
                        com_port: event.com_port,
                        sender_number: event.sender_number,
                        message_content: event.message_content,
                        received_time: event.received_time,
                        sms_timestamp: event.sms_timestamp,
                    },
                });
            }),
            on_call_hangup: Box::new(move |event: CallHangup| {
                let _ = hangup_tx.send(AgentToServer::SendCallHangupRecord {
                    device_id: hangup_device.clone(),
                    hangup: CallHangupEventDto {
                        device_id: hangup_device.clone(),
                        com_port: event.com_port,
                        caller_number: event.caller_number,
                        hangup_time: event.hangup_time,
                        reason: event.reason.as_str().to_string(),
                        raw_line: event.raw_line,
                    },
                });
            }),
        };

        let receiver_config = ReceiverConfig {
            hangup: HangupPolicy {
                enabled: config.hangup.enabled,
                hangup_delay: Duration::from_millis(config.hangup.hangup_delay_ms),
                cooldown: Duration::from_millis(config.hangup.cooldown_ms),
                whitelist: config.hangup.whitelist.clone(),
            },
            ..ReceiverConfig::default()
        };
        let receiver = Arc::new(SmsReceiver::new(opener.clone(), receiver_config, events));
        let sender = Arc::new(SmsSender::new(
            opener.clone(),
            receiver.clone(),
            SenderConfig::default(),
        ));
        let scanner_config = ScannerConfig {
            baud_rates: config.baud_rates.clone(),
            ..ScannerConfig::default()
        };
        let scanner = ComPortScanner::new(opener, scanner_config);

        Arc::new(Self {
            device_id,
            auto_start_on_scan: config.auto_start_on_scan,
            scanner,
            receiver,
            sender,
            events_tx,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// 目标设备匹配：空串表示不限定。
    pub fn matches(&self, target_device_id: &str) -> bool {
        target_device_id.is_empty() || target_device_id.eq_ignore_ascii_case(&self.device_id)
    }

    fn emit(&self, event: AgentToServer) {
        let _ = self.events_tx.send(event);
    }

    /// 扫描：确认 → 增量上报 → 完成时间 + 全量结果 → 自动启动监听。
    pub fn run_scan(self: &Arc<Self>) {
        let driver = self.clone();
        tokio::task::spawn_blocking(move || {
            driver.emit(AgentToServer::SendScanAcknowledgment {
                device_id: driver.device_id.clone(),
                message: "scan started".to_string(),
            });
            let stream_driver = driver.clone();
            let result = driver.scanner.scan(&mut |port: &PortInfo| {
                stream_driver.emit(AgentToServer::SendComPortFound {
                    device_id: stream_driver.device_id.clone(),
                    port: port_to_dto(&stream_driver.device_id, port),
                });
            });
            driver.emit(AgentToServer::SendComPortScanCompleted {
                device_id: driver.device_id.clone(),
                completed_at: Utc::now().to_rfc3339(),
            });
            driver.emit(AgentToServer::SendComPortScanResult {
                device_id: driver.device_id.clone(),
                result: scan_result_to_dto(&driver.device_id, &result),
            });

            if driver.auto_start_on_scan {
                let ports: Vec<ListenPort> = result
                    .ports
                    .iter()
                    .filter(|port| {
                        port.is_sms_modem
                            && port
                                .modem_info
                                .as_ref()
                                .map(|info| info.has_sim_card)
                                .unwrap_or(false)
                            && port.baud_rate.is_some()
                    })
                    .map(|port| ListenPort {
                        port_name: port.port_name.clone(),
                        baud_rate: port.baud_rate.unwrap_or(115_200),
                    })
                    .collect();
                if !ports.is_empty() {
                    info!(count = ports.len(), "auto-starting sms receivers after scan");
                    driver.receiver.start_listening(&ports);
                }
            }
        });
    }

    /// 启动监听（幂等）。
    pub fn start_receiver(&self, ports: Vec<ListenPort>) {
        self.receiver.start_listening(&ports);
    }

    /// 停止监听（等全部端口释放）。
    pub fn stop_receiver(self: &Arc<Self>) {
        let driver = self.clone();
        tokio::task::spawn_blocking(move || {
            driver.receiver.stop();
        });
    }

    /// 发送短信，完成后回报结果。
    pub fn run_send(
        self: &Arc<Self>,
        com_port: String,
        target_number: String,
        message_content: String,
        record_id: String,
    ) {
        let driver = self.clone();
        tokio::task::spawn_blocking(move || {
            let report = driver
                .sender
                .send_sms(&com_port, &target_number, &message_content);
            let status = if report.success { "Success" } else { "Failed" };
            if report.success {
                smsgw_telemetry::record_send_succeeded();
            } else {
                smsgw_telemetry::record_send_failed();
                warn!(port = %com_port, error = ?report.error, "sms send failed");
            }
            driver.emit(AgentToServer::SendSmsResult {
                record_id,
                status: status.to_string(),
                error: report.error,
            });
        });
    }

    /// 退出清理：停监听、放句柄。
    pub fn shutdown(&self) {
        self.receiver.stop();
        self.sender.shutdown();
    }
}

fn modem_info_to_dto(info: &ModemInfo) -> ModemInfoDto {
    ModemInfoDto {
        has_sim_card: info.has_sim_card,
        iccid: info.iccid.clone(),
        operator: info.operator.clone(),
        signal_strength: info.signal_strength,
        signal_quality: info.signal_quality.clone(),
        phone_number: info.phone_number.clone(),
        manufacturer: info.manufacturer.clone(),
        model: info.model.clone(),
        firmware: info.firmware.clone(),
        imei: info.imei.clone(),
        sim_status: info.sim_status.clone(),
        network_status: info.network_status.clone(),
    }
}

fn port_to_dto(device_id: &str, port: &PortInfo) -> PortInfoDto {
    PortInfoDto {
        device_id: device_id.to_string(),
        port_name: port.port_name.clone(),
        is_available: port.is_available,
        is_sms_modem: port.is_sms_modem,
        baud_rate: port.baud_rate,
        modem_info: port.modem_info.as_ref().map(modem_info_to_dto),
        raw: port.raw.clone(),
    }
}

fn scan_result_to_dto(device_id: &str, result: &ScanResult) -> ScanResultDto {
    ScanResultDto {
        scan_time: result.scan_time,
        success: result.success,
        error: result.error.clone(),
        ports: result
            .ports
            .iter()
            .map(|port| port_to_dto(device_id, port))
            .collect(),
    }
}
