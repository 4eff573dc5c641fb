//! 串口驱动端到端流程测试（脚本化 Mock 串口）。

use chrono::{TimeZone, Utc};
use smsgw_modem::{
    CallHangup, ComPortScanner, HangupPolicy, ListenPort, ModemError, OpenSettings,
    ReceiverConfig, ReceiverEvents, ScannerConfig, SenderConfig, SerialLink, SerialOpener,
    SmsReceived, SmsReceiver, SmsSender,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Mock 串口
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockPortState {
    incoming: VecDeque<u8>,
    /// (命令去掉行尾, 响应) 精确匹配；未命中且 default_ok 时回 OK。
    responders: Vec<(String, String)>,
    default_ok: bool,
    /// Ctrl-Z 结尾的载荷写入后注入的响应（CMGS 对话用）。
    on_ctrl_z: Option<String>,
    /// 时间线事件：open / close / write:<文本>
    events: Vec<String>,
}

#[derive(Clone, Default)]
struct MockPort(Arc<Mutex<MockPortState>>);

impl MockPort {
    fn push_incoming(&self, data: &str) {
        let mut state = self.0.lock().unwrap();
        state.incoming.extend(data.as_bytes());
    }

    fn respond(&self, command: &str, response: &str) {
        let mut state = self.0.lock().unwrap();
        state
            .responders
            .push((command.to_string(), response.to_string()));
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().events.clone()
    }

    fn writes(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| event.strip_prefix("write:").map(str::to_string))
            .collect()
    }
}

struct MockLink {
    port: MockPort,
}

impl Drop for MockLink {
    fn drop(&mut self) {
        self.port.0.lock().unwrap().events.push("close".to_string());
    }
}

impl SerialLink for MockLink {
    fn write_all(&mut self, data: &[u8]) -> Result<(), ModemError> {
        let mut state = self.port.0.lock().unwrap();
        let text = String::from_utf8_lossy(data).into_owned();
        state.events.push(format!("write:{}", text.trim_end()));

        if data.last() == Some(&0x1A) {
            if let Some(response) = state.on_ctrl_z.clone() {
                state.incoming.extend(response.as_bytes());
            }
            return Ok(());
        }
        let command = text.trim_end_matches(['\r', '\n']).to_string();
        let response = state
            .responders
            .iter()
            .find(|(expected, _)| *expected == command)
            .map(|(_, response)| response.clone())
            .or_else(|| {
                if state.default_ok && command.starts_with("AT") {
                    Some("\r\nOK\r\n".to_string())
                } else {
                    None
                }
            });
        if let Some(response) = response {
            state.incoming.extend(response.as_bytes());
        }
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>, ModemError> {
        let mut state = self.port.0.lock().unwrap();
        Ok(state.incoming.drain(..).collect())
    }

    fn clear_buffers(&mut self) -> Result<(), ModemError> {
        self.port.0.lock().unwrap().incoming.clear();
        Ok(())
    }
}

#[derive(Default)]
struct MockOpener {
    ports: Mutex<HashMap<String, MockPort>>,
    order: Mutex<Vec<String>>,
}

impl MockOpener {
    fn add_port(&self, name: &str, default_ok: bool) -> MockPort {
        let port = MockPort::default();
        port.0.lock().unwrap().default_ok = default_ok;
        self.ports
            .lock()
            .unwrap()
            .insert(name.to_string(), port.clone());
        self.order.lock().unwrap().push(name.to_string());
        port
    }

    /// 注册一个打不开的端口名（枚举可见，open 失败）。
    fn add_dead_port(&self, name: &str) {
        self.order.lock().unwrap().push(name.to_string());
    }
}

impl SerialOpener for MockOpener {
    fn list_ports(&self) -> Result<Vec<String>, ModemError> {
        Ok(self.order.lock().unwrap().clone())
    }

    fn open(
        &self,
        port_name: &str,
        _settings: &OpenSettings,
    ) -> Result<Box<dyn SerialLink>, ModemError> {
        let port = self
            .ports
            .lock()
            .unwrap()
            .get(port_name)
            .cloned()
            .ok_or_else(|| ModemError::Open {
                port: port_name.to_string(),
                reason: "no such port".to_string(),
            })?;
        port.0.lock().unwrap().events.push("open".to_string());
        Ok(Box::new(MockLink { port }))
    }
}

// ---------------------------------------------------------------------------
// 辅助
// ---------------------------------------------------------------------------

fn fast_receiver_config(hangup: HangupPolicy) -> ReceiverConfig {
    ReceiverConfig {
        hangup,
        poll_interval: Duration::from_millis(2),
        init_command_gap: Duration::from_millis(1),
        command_timeout: Duration::from_millis(300),
        reopen_delay: Duration::from_millis(20),
    }
}

fn fast_sender_config() -> SenderConfig {
    SenderConfig {
        baud_rate: 115_200,
        pause_settle: Duration::from_millis(10),
        open_settle: Duration::from_millis(1),
        init_command_gap: Duration::from_millis(1),
        command_timeout: Duration::from_millis(300),
        prompt_timeout: Duration::from_millis(500),
        complete_timeout: Duration::from_millis(500),
    }
}

type SmsLog = Arc<Mutex<Vec<SmsReceived>>>;
type HangupLog = Arc<Mutex<Vec<CallHangup>>>;

fn collecting_events() -> (ReceiverEvents, SmsLog, HangupLog) {
    let sms_log: SmsLog = Arc::new(Mutex::new(Vec::new()));
    let hangup_log: HangupLog = Arc::new(Mutex::new(Vec::new()));
    let sms_clone = sms_log.clone();
    let hangup_clone = hangup_log.clone();
    let events = ReceiverEvents {
        on_sms_received: Box::new(move |event| sms_clone.lock().unwrap().push(event)),
        on_call_hangup: Box::new(move |event| hangup_clone.lock().unwrap().push(event)),
    };
    (events, sms_log, hangup_log)
}

fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

fn wait_for_listener_init(port: &MockPort) {
    assert!(
        wait_until(Duration::from_secs(5), || {
            port.writes().iter().any(|write| write == "AT+CSCS=\"GSM\"")
        }),
        "listener init did not finish: {:?}",
        port.events()
    );
}

// ---------------------------------------------------------------------------
// 场景 S1：UCS2 直推短信
// ---------------------------------------------------------------------------

#[test]
fn cmt_push_is_decoded_and_emitted() {
    let opener = Arc::new(MockOpener::default());
    let port = opener.add_port("COM3", true);
    let (events, sms_log, _) = collecting_events();
    let receiver = SmsReceiver::new(
        opener.clone(),
        fast_receiver_config(HangupPolicy::default()),
        events,
    );
    receiver.start_listening(&[ListenPort {
        port_name: "COM3".to_string(),
        baud_rate: 115_200,
    }]);
    wait_for_listener_init(&port);

    port.push_incoming("+CMT: \"+8613800138000\",,\"26/01/23,14:30:45+32\"\r\n\r\n4F604F60\r\n");
    assert!(wait_until(Duration::from_secs(5), || {
        !sms_log.lock().unwrap().is_empty()
    }));
    receiver.stop();

    let events = sms_log.lock().unwrap();
    assert_eq!(events.len(), 1);
    let sms = &events[0];
    assert_eq!(sms.com_port, "COM3");
    assert_eq!(sms.sender_number, "+8613800138000");
    assert_eq!(sms.message_content, "你你");
    assert_eq!(
        sms.received_time,
        Utc.with_ymd_and_hms(2026, 1, 23, 14, 30, 45).unwrap()
    );
    assert_eq!(sms.sms_timestamp.as_deref(), Some("26/01/23,14:30:45+32"));
}

// ---------------------------------------------------------------------------
// 场景 S2：存储短信（+CMTI → CMGR → CMGD）
// ---------------------------------------------------------------------------

#[test]
fn cmti_reads_and_deletes_stored_sms() {
    let opener = Arc::new(MockOpener::default());
    let port = opener.add_port("COM4", true);
    port.respond(
        "AT+CMGR=7",
        "+CMGR: \"REC UNREAD\",\"+15551234567\",,\"25/06/01,10:00:00+00\"\r\nHello\r\nOK\r\n",
    );
    let (events, sms_log, _) = collecting_events();
    let receiver = SmsReceiver::new(
        opener.clone(),
        fast_receiver_config(HangupPolicy::default()),
        events,
    );
    receiver.start_listening(&[ListenPort {
        port_name: "COM4".to_string(),
        baud_rate: 115_200,
    }]);
    wait_for_listener_init(&port);

    port.push_incoming("\r\n+CMTI: \"SM\",7\r\n");
    assert!(wait_until(Duration::from_secs(5), || {
        !sms_log.lock().unwrap().is_empty()
    }));
    // 读取后删除
    assert!(wait_until(Duration::from_secs(5), || {
        port.writes().iter().any(|write| write == "AT+CMGD=7")
    }));
    receiver.stop();

    let events = sms_log.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].sender_number, "+15551234567");
    assert_eq!(events[0].message_content, "Hello");
    assert_eq!(
        events[0].received_time,
        Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
    );

    let writes = port.writes();
    assert!(writes.iter().any(|write| write == "AT+CMGR=7"));
}

// ---------------------------------------------------------------------------
// 场景 S3：自动挂断与白名单
// ---------------------------------------------------------------------------

#[test]
fn whitelisted_caller_is_not_hung_up() {
    let opener = Arc::new(MockOpener::default());
    let port = opener.add_port("COM5", true);
    let policy = HangupPolicy {
        enabled: true,
        hangup_delay: Duration::from_millis(5),
        cooldown: Duration::from_millis(100),
        whitelist: vec!["555".to_string()],
    };
    let (events, _, hangup_log) = collecting_events();
    let receiver = SmsReceiver::new(opener.clone(), fast_receiver_config(policy), events);
    receiver.start_listening(&[ListenPort {
        port_name: "COM5".to_string(),
        baud_rate: 115_200,
    }]);
    wait_for_listener_init(&port);

    port.push_incoming("RING\r\n+CLIP: \"+15550001111\",145,,,,0\r\n");
    std::thread::sleep(Duration::from_millis(150));
    receiver.stop();

    let writes = port.writes();
    assert!(!writes.iter().any(|write| write == "ATH"));
    assert!(!writes.iter().any(|write| write == "AT+CHUP"));
    assert!(hangup_log.lock().unwrap().is_empty());
}

#[test]
fn non_whitelisted_caller_is_hung_up_once() {
    let opener = Arc::new(MockOpener::default());
    let port = opener.add_port("COM5", true);
    let policy = HangupPolicy {
        enabled: true,
        hangup_delay: Duration::from_millis(5),
        cooldown: Duration::from_millis(60_000),
        whitelist: vec!["555".to_string()],
    };
    let (events, _, hangup_log) = collecting_events();
    let receiver = SmsReceiver::new(opener.clone(), fast_receiver_config(policy), events);
    receiver.start_listening(&[ListenPort {
        port_name: "COM5".to_string(),
        baud_rate: 115_200,
    }]);
    wait_for_listener_init(&port);

    port.push_incoming("RING\r\n+CLIP: \"+16660002222\",145,,,,0\r\n");
    assert!(wait_until(Duration::from_secs(5), || {
        !hangup_log.lock().unwrap().is_empty()
    }));
    receiver.stop();

    let writes = port.writes();
    assert_eq!(writes.iter().filter(|write| *write == "ATH").count(), 1);
    assert_eq!(writes.iter().filter(|write| *write == "AT+CHUP").count(), 1);
    // ATH 先于 AT+CHUP
    let ath = writes.iter().position(|write| write == "ATH").unwrap();
    let chup = writes.iter().position(|write| write == "AT+CHUP").unwrap();
    assert!(ath < chup);

    let hangups = hangup_log.lock().unwrap();
    assert_eq!(hangups.len(), 1);
    assert_eq!(hangups[0].reason.as_str(), "AutoHangup");
    assert_eq!(hangups[0].caller_number.as_deref(), Some("+16660002222"));
    assert!(hangups[0].raw_line.is_some());
}

/// 不变量 5：冷却窗口内 N 阵 RING 至多一次挂断事件。
#[test]
fn hangup_cooldown_bounds_events() {
    let opener = Arc::new(MockOpener::default());
    let port = opener.add_port("COM6", true);
    let policy = HangupPolicy {
        enabled: true,
        hangup_delay: Duration::from_millis(2),
        cooldown: Duration::from_secs(60),
        whitelist: Vec::new(),
    };
    let (events, _, hangup_log) = collecting_events();
    let receiver = SmsReceiver::new(opener.clone(), fast_receiver_config(policy), events);
    receiver.start_listening(&[ListenPort {
        port_name: "COM6".to_string(),
        baud_rate: 115_200,
    }]);
    wait_for_listener_init(&port);

    for _ in 0..5 {
        port.push_incoming("RING\r\n+CLIP: \"+16660002222\",145\r\n");
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(wait_until(Duration::from_secs(5), || {
        !hangup_log.lock().unwrap().is_empty()
    }));
    std::thread::sleep(Duration::from_millis(100));
    receiver.stop();

    assert_eq!(hangup_log.lock().unwrap().len(), 1);
    let writes = port.writes();
    assert_eq!(writes.iter().filter(|write| *write == "ATH").count(), 1);
}

// ---------------------------------------------------------------------------
// 不变量 6：单端口事件按 +CMTI 到达顺序发出
// ---------------------------------------------------------------------------

#[test]
fn cmti_emission_preserves_arrival_order() {
    let opener = Arc::new(MockOpener::default());
    let port = opener.add_port("COM7", true);
    port.respond(
        "AT+CMGR=1",
        "+CMGR: \"REC UNREAD\",\"+10001\",,\"25/06/01,10:00:00+00\"\r\nfirst\r\nOK\r\n",
    );
    port.respond(
        "AT+CMGR=2",
        "+CMGR: \"REC UNREAD\",\"+10002\",,\"25/06/01,10:00:01+00\"\r\nsecond\r\nOK\r\n",
    );
    port.respond(
        "AT+CMGR=3",
        "+CMGR: \"REC UNREAD\",\"+10003\",,\"25/06/01,10:00:02+00\"\r\nthird\r\nOK\r\n",
    );
    let (events, sms_log, _) = collecting_events();
    let receiver = SmsReceiver::new(
        opener.clone(),
        fast_receiver_config(HangupPolicy::default()),
        events,
    );
    receiver.start_listening(&[ListenPort {
        port_name: "COM7".to_string(),
        baud_rate: 115_200,
    }]);
    wait_for_listener_init(&port);

    port.push_incoming("+CMTI: \"SM\",1\r\n+CMTI: \"SM\",2\r\n");
    assert!(wait_until(Duration::from_secs(5), || {
        sms_log.lock().unwrap().len() == 2
    }));
    port.push_incoming("+CMTI: \"SM\",3\r\n");
    assert!(wait_until(Duration::from_secs(5), || {
        sms_log.lock().unwrap().len() == 3
    }));
    receiver.stop();

    let contents: Vec<String> = sms_log
        .lock()
        .unwrap()
        .iter()
        .map(|event| event.message_content.clone())
        .collect();
    assert_eq!(contents, vec!["first", "second", "third"]);
}

// ---------------------------------------------------------------------------
// 场景 S4：发送事务与监听共存
// ---------------------------------------------------------------------------

#[test]
fn send_transaction_pauses_and_resumes_listener() {
    let opener = Arc::new(MockOpener::default());
    let port = opener.add_port("COM8", true);
    port.respond("AT+CMGS=\"+15551230000\"", "\r\n> ");
    {
        let mut state = port.0.lock().unwrap();
        state.on_ctrl_z = Some("\r\n+CMGS: 21\r\n\r\nOK\r\n".to_string());
    }

    let (events, _, _) = collecting_events();
    let receiver = Arc::new(SmsReceiver::new(
        opener.clone(),
        fast_receiver_config(HangupPolicy::default()),
        events,
    ));
    receiver.start_listening(&[ListenPort {
        port_name: "COM8".to_string(),
        baud_rate: 115_200,
    }]);
    wait_for_listener_init(&port);

    let sender = SmsSender::new(opener.clone(), receiver.clone(), fast_sender_config());
    let report = sender.send_sms("COM8", "+15551230000", "hi");
    assert!(report.success, "send failed: {:?}", report.error);
    assert_eq!(report.message_reference.as_deref(), Some("21"));

    // 监听恢复后重新挂载并重跑初始化
    assert!(wait_until(Duration::from_secs(5), || {
        let writes = port.writes();
        writes
            .iter()
            .filter(|write| *write == "AT+CNMI=2,2,0,0,0")
            .count()
            >= 2
    }));
    receiver.stop();
    sender.shutdown();

    let events = port.events();
    let cmgs_at = events
        .iter()
        .position(|event| event.starts_with("write:AT+CMGS"))
        .expect("cmgs written");
    let close_before = events[..cmgs_at]
        .iter()
        .rposition(|event| event == "close")
        .expect("listener handle closed before cmgs");
    let reopen_after = events[cmgs_at..]
        .iter()
        .position(|event| event == "open")
        .expect("listener reopened after send");
    assert!(close_before < cmgs_at);
    assert!(reopen_after > 0);
}

#[test]
fn send_validation_reports_specific_errors() {
    let opener = Arc::new(MockOpener::default());
    let (events, _, _) = collecting_events();
    let receiver = Arc::new(SmsReceiver::new(
        opener.clone(),
        fast_receiver_config(HangupPolicy::default()),
        events,
    ));
    let sender = SmsSender::new(opener, receiver, fast_sender_config());

    let report = sender.send_sms("", "+1", "hi");
    assert_eq!(report.error.as_deref(), Some("COM port is required"));
    let report = sender.send_sms("COM1", " ", "hi");
    assert_eq!(report.error.as_deref(), Some("target number is required"));
    let report = sender.send_sms("COM1", "+1", "");
    assert_eq!(report.error.as_deref(), Some("message content is required"));
}

#[test]
fn send_failure_reports_cms_error() {
    let opener = Arc::new(MockOpener::default());
    let port = opener.add_port("COM9", true);
    port.respond("AT+CMGS=\"+15551230000\"", "\r\n+CMS ERROR: 500\r\n");
    let (events, _, _) = collecting_events();
    let receiver = Arc::new(SmsReceiver::new(
        opener.clone(),
        fast_receiver_config(HangupPolicy::default()),
        events,
    ));
    let sender = SmsSender::new(opener, receiver, fast_sender_config());

    let report = sender.send_sms("COM9", "+15551230000", "hi");
    assert!(!report.success);
    assert!(report.error.unwrap().contains("+CMS ERROR"));
}

// ---------------------------------------------------------------------------
// 扫描器：双次上报与失败端口
// ---------------------------------------------------------------------------

#[test]
fn scan_emits_twice_per_identified_port() {
    let opener = Arc::new(MockOpener::default());
    let port = opener.add_port("COM3", true);
    port.respond("AT+CPIN?", "\r\n+CPIN: READY\r\n\r\nOK\r\n");
    port.respond("AT+CSQ", "\r\n+CSQ: 24,0\r\n\r\nOK\r\n");
    port.respond("AT+COPS?", "\r\n+COPS: 0,0,\"CHINA MOBILE\",7\r\n\r\nOK\r\n");
    port.respond("AT+CREG?", "\r\n+CREG: 0,1\r\n\r\nOK\r\n");
    port.respond("AT+CCID", "\r\n+CCID: 89860012345678901234\r\n\r\nOK\r\n");
    port.respond("AT+CGSN", "\r\n860000000000000\r\n\r\nOK\r\n");
    opener.add_dead_port("COM4");

    let config = ScannerConfig {
        baud_rates: vec![115_200],
        probe_attempts: 1,
        probe_budget: Duration::from_millis(200),
        settle_delay: Duration::from_millis(1),
        detail_budget: Duration::from_secs(5),
        command_timeout: Duration::from_millis(300),
    };
    let scanner = ComPortScanner::new(opener.clone(), config);

    let mut emissions = Vec::new();
    let result = scanner.scan(&mut |port| emissions.push(port.clone()));

    assert!(result.success);
    assert_eq!(result.ports.len(), 2);

    // 识别后一次（无详情）、补全后一次
    assert_eq!(emissions.len(), 2);
    assert_eq!(emissions[0].port_name, "COM3");
    assert!(emissions[0].is_sms_modem);
    assert!(emissions[0].modem_info.is_none());
    assert_eq!(emissions[0].baud_rate, Some(115_200));
    let info = emissions[1].modem_info.as_ref().expect("details gathered");
    assert!(info.has_sim_card);
    assert_eq!(info.operator.as_deref(), Some("CHINA MOBILE"));
    assert_eq!(info.signal_strength, Some(24));
    assert_eq!(info.signal_quality.as_deref(), Some("Good"));
    assert_eq!(info.network_status.as_deref(), Some("Registered Home"));
    assert_eq!(info.iccid.as_deref(), Some("89860012345678901234"));
    assert_eq!(info.imei.as_deref(), Some("860000000000000"));

    // 打不开的端口：不可用、非短信猫、扫描继续
    let dead = result
        .ports
        .iter()
        .find(|port| port.port_name == "COM4")
        .expect("dead port reported");
    assert!(!dead.is_available);
    assert!(!dead.is_sms_modem);
}

#[test]
fn scan_keeps_available_flag_for_silent_port() {
    let opener = Arc::new(MockOpener::default());
    // 打得开但从不应答
    opener.add_port("COM2", false);
    let config = ScannerConfig {
        baud_rates: vec![115_200, 9600],
        probe_attempts: 1,
        probe_budget: Duration::from_millis(50),
        settle_delay: Duration::from_millis(1),
        detail_budget: Duration::from_secs(1),
        command_timeout: Duration::from_millis(100),
    };
    let scanner = ComPortScanner::new(opener.clone(), config);
    let result = scanner.scan(&mut |_| {});
    assert_eq!(result.ports.len(), 1);
    assert!(result.ports[0].is_available);
    assert!(!result.ports[0].is_sms_modem);
    assert_eq!(result.ports[0].baud_rate, None);
}
