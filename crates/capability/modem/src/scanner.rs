//! COM 口扫描器
//!
//! 按操作系统枚举顺序逐口探测：波特率级联试探 `AT`，识别成功后在
//! 25 s 预算内逐项查询详情。每个识别出的端口增量上报两次——识别后
//! 立即一次（modem_info 为空），详情补全后再一次（按端口名 upsert），
//! 便于前端边扫边渲染。
//!
//! ## 探测
//!
//! 每个波特率：打开 → 清缓冲 → 等 300 ms（DTR/RTS 稳定）→ 至多 3 次
//! 尝试，每次 1.5 s 预算：先写 `AT\r`，半程无可识别响应再补写
//! `AT\r\n`。出现 `OK`/`ERROR`/`+CME ERROR`/`+CMS ERROR` 即识别成功。
//!
//! ## 详情
//!
//! 单项查询卡住只跳过该项，不中断整口；全口详情封顶 25 s。

use crate::at;
use crate::error::ModemError;
use crate::io::{OpenSettings, SerialLink, SerialOpener};
use crate::types::{ModemInfo, PortInfo, ScanResult};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 扫描参数（缺省值面向真实硬件，测试可缩短）。
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub baud_rates: Vec<u32>,
    pub probe_attempts: u32,
    pub probe_budget: Duration,
    pub settle_delay: Duration,
    pub detail_budget: Duration,
    pub command_timeout: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            baud_rates: vec![115_200, 9600, 19_200, 38_400, 57_600],
            probe_attempts: 3,
            probe_budget: Duration::from_millis(1500),
            settle_delay: Duration::from_millis(300),
            detail_budget: Duration::from_secs(25),
            command_timeout: Duration::from_secs(3),
        }
    }
}

/// COM 口扫描器。
pub struct ComPortScanner {
    opener: Arc<dyn SerialOpener>,
    config: ScannerConfig,
}

impl ComPortScanner {
    pub fn new(opener: Arc<dyn SerialOpener>, config: ScannerConfig) -> Self {
        Self { opener, config }
    }

    /// 扫描全部端口，经 `on_port_found` 增量上报。
    pub fn scan(&self, on_port_found: &mut dyn FnMut(&PortInfo)) -> ScanResult {
        let scan_time = Utc::now();
        let port_names = match self.opener.list_ports() {
            Ok(names) => names,
            Err(err) => {
                warn!(error = %err, "serial port enumeration failed");
                return ScanResult {
                    scan_time,
                    success: false,
                    error: Some(err.to_string()),
                    ports: Vec::new(),
                };
            }
        };
        info!(count = port_names.len(), "com port scan started");

        let mut ports = Vec::with_capacity(port_names.len());
        for port_name in port_names {
            let port = self.scan_port(&port_name, on_port_found);
            ports.push(port);
        }
        info!(
            identified = ports.iter().filter(|port| port.is_sms_modem).count(),
            "com port scan finished"
        );
        ScanResult {
            scan_time,
            success: true,
            error: None,
            ports,
        }
    }

    /// 单口扫描：波特率级联探测 + 详情查询。
    fn scan_port(&self, port_name: &str, on_port_found: &mut dyn FnMut(&PortInfo)) -> PortInfo {
        let mut ever_opened = false;
        for &baud_rate in &self.config.baud_rates {
            let mut link = match self
                .opener
                .open(port_name, &OpenSettings::new(baud_rate))
            {
                Ok(link) => link,
                Err(err) => {
                    debug!(port = port_name, baud = baud_rate, error = %err, "open failed");
                    continue;
                }
            };
            ever_opened = true;
            if link.clear_buffers().is_err() {
                continue;
            }
            std::thread::sleep(self.config.settle_delay);

            let Some(raw) = self.probe(link.as_mut(), port_name, baud_rate) else {
                continue;
            };

            // 识别成功：先增量上报一次，再补详情
            let mut port = PortInfo {
                port_name: port_name.to_string(),
                is_available: true,
                is_sms_modem: true,
                baud_rate: Some(baud_rate),
                modem_info: None,
                raw: Some(truncate(&raw, 256)),
            };
            on_port_found(&port);

            port.modem_info = Some(self.gather_details(link.as_mut()));
            on_port_found(&port);
            return port;
        }

        PortInfo {
            port_name: port_name.to_string(),
            is_available: ever_opened,
            is_sms_modem: false,
            baud_rate: None,
            modem_info: None,
            raw: None,
        }
    }

    /// `AT` 探测。返回累积的原始响应。
    fn probe(&self, link: &mut dyn SerialLink, port_name: &str, baud_rate: u32) -> Option<String> {
        for attempt in 1..=self.config.probe_attempts {
            let half = self.config.probe_budget / 2;
            if link.write_all(b"AT\r").is_err() {
                return None;
            }
            let mut collected = match collect_until_terminator(link, half) {
                Ok(text) => return Some(text),
                Err(partial) => partial,
            };
            // 半程无响应，换行风再试
            if link.write_all(b"AT\r\n").is_err() {
                return None;
            }
            match collect_until_terminator(link, half) {
                Ok(text) => {
                    collected.push_str(&text);
                    return Some(collected);
                }
                Err(partial) => {
                    debug!(
                        port = port_name,
                        baud = baud_rate,
                        attempt,
                        "probe attempt without recognizable response"
                    );
                    collected.push_str(&partial);
                }
            }
        }
        None
    }

    /// 详情查询。整体 25 s 预算，单项失败仅跳过。
    fn gather_details(&self, link: &mut dyn SerialLink) -> ModemInfo {
        let deadline = Instant::now() + self.config.detail_budget;
        let mut info = ModemInfo::default();

        info.manufacturer = self.query(link, "AT+CGMI", deadline);
        info.model = self.query(link, "AT+CGMM", deadline);
        info.firmware = self.query(link, "AT+CGMR", deadline);
        info.imei = self
            .query(link, "AT+CGSN", deadline)
            .map(|payload| digits_only(&payload))
            .filter(|imei| !imei.is_empty());

        if let Some(cpin) = self.query(link, "AT+CPIN?", deadline) {
            info.has_sim_card = cpin.contains("READY") || cpin.contains("SIM PIN");
            info.sim_status = Some(cpin);
        }

        if let Some(cops) = self.query(link, "AT+COPS?", deadline) {
            info.operator = first_quoted(&cops);
        }

        if let Some(csq) = self.query(link, "AT+CSQ", deadline) {
            if let Some(strength) = parse_signal_strength(&csq) {
                info.signal_strength = Some(strength);
                info.signal_quality = Some(signal_quality_label(strength).to_string());
            }
        }

        if let Some(creg) = self.query(link, "AT+CREG?", deadline) {
            info.network_status = parse_network_status(&creg).map(str::to_string);
        }

        // 无 SIM 卡时 ICCID / 本机号码没有意义
        if info.has_sim_card {
            for command in ["AT+CCID", "AT+ICCID", "AT^ICCID"] {
                if let Some(iccid) = self
                    .query(link, command, deadline)
                    .and_then(|payload| extract_iccid(&payload))
                {
                    info.iccid = Some(iccid);
                    break;
                }
            }
            if let Some(cnum) = self.query(link, "AT+CNUM", deadline) {
                info.phone_number = parse_own_number(&cnum);
            }
        }

        info
    }

    /// 带总预算的单项查询。预算耗尽或超时返回 None。
    fn query(&self, link: &mut dyn SerialLink, command: &str, deadline: Instant) -> Option<String> {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        let timeout = remaining.min(self.config.command_timeout);
        match at::send_command(link, command, timeout) {
            Ok(raw) => {
                let payload = at::extract_payload(&raw, command);
                if payload.is_empty() { None } else { Some(payload) }
            }
            Err(ModemError::Timeout(_)) => {
                debug!(command, "detail query timed out, skipped");
                None
            }
            Err(err) => {
                debug!(command, error = %err, "detail query failed, skipped");
                None
            }
        }
    }
}

/// 轮询累积直到终止符；超时把已累积内容作为 Err 交还。
fn collect_until_terminator(
    link: &mut dyn SerialLink,
    budget: Duration,
) -> Result<String, String> {
    let deadline = Instant::now() + budget;
    let mut collected = String::new();
    loop {
        match link.read_available() {
            Ok(chunk) if !chunk.is_empty() => {
                collected.push_str(&String::from_utf8_lossy(&chunk));
                if at::contains_terminator(&collected) {
                    return Ok(collected);
                }
            }
            Ok(_) => {}
            Err(_) => return Err(collected),
        }
        if Instant::now() >= deadline {
            return Err(collected);
        }
        std::thread::sleep(at::POLL_INTERVAL);
    }
}

fn truncate(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text[..cut].to_string()
}

fn digits_only(text: &str) -> String {
    text.chars().filter(|ch| ch.is_ascii_digit()).collect()
}

/// `+COPS: 0,0,"CHINA MOBILE",7` → 第一个引号串。
pub fn first_quoted(text: &str) -> Option<String> {
    let start = text.find('"')?;
    let rest = &text[start + 1..];
    let end = rest.find('"')?;
    let value = &rest[..end];
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// `+CSQ: 24,0` → 24。
pub fn parse_signal_strength(text: &str) -> Option<i32> {
    let position = text.find("+CSQ:")?;
    let rest = text[position + 5..].trim_start();
    let digits: String = rest
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// 信号强度 → 质量档位。
pub fn signal_quality_label(strength: i32) -> &'static str {
    match strength {
        0 | 99 => "No Signal",
        1..=9 => "Very Weak",
        10..=14 => "Weak",
        15..=19 => "Fair",
        20..=24 => "Good",
        25..=31 => "Excellent",
        _ => "Unknown",
    }
}

/// `+CREG: 0,1` → 第二个字段映射注册状态。
pub fn parse_network_status(text: &str) -> Option<&'static str> {
    let position = text.find("+CREG:")?;
    let rest = &text[position + 6..];
    let second = rest.split(',').nth(1)?.trim();
    let second: String = second
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .collect();
    match second.as_str() {
        "0" => Some("Not registered"),
        "1" => Some("Registered Home"),
        "2" => Some("Searching"),
        "3" => Some("Denied"),
        "5" => Some("Registered Roaming"),
        _ => None,
    }
}

/// 响应中的数字串（18–22 位）即 ICCID。
pub fn extract_iccid(text: &str) -> Option<String> {
    let mut run = String::new();
    let mut best: Option<String> = None;
    for ch in text.chars().chain(std::iter::once(' ')) {
        if ch.is_ascii_digit() {
            run.push(ch);
            continue;
        }
        if (18..=22).contains(&run.len())
            && best.as_ref().map(|value| value.len()).unwrap_or(0) < run.len()
        {
            best = Some(run.clone());
        }
        run.clear();
    }
    best
}

/// `+CNUM: "","+8613800138000",145` → 第一个以 `+` 或数字开头的引号串。
pub fn parse_own_number(text: &str) -> Option<String> {
    let mut rest = text;
    while let Some(start) = rest.find('"') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('"') else {
            return None;
        };
        let value = &after[..end];
        if value.starts_with('+') || value.chars().next().is_some_and(|ch| ch.is_ascii_digit()) {
            return Some(value.to_string());
        }
        rest = &after[end + 1..];
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_quality_table() {
        assert_eq!(signal_quality_label(0), "No Signal");
        assert_eq!(signal_quality_label(99), "No Signal");
        assert_eq!(signal_quality_label(5), "Very Weak");
        assert_eq!(signal_quality_label(12), "Weak");
        assert_eq!(signal_quality_label(17), "Fair");
        assert_eq!(signal_quality_label(24), "Good");
        assert_eq!(signal_quality_label(31), "Excellent");
        assert_eq!(signal_quality_label(50), "Unknown");
    }

    #[test]
    fn parses_csq() {
        assert_eq!(parse_signal_strength("+CSQ: 24,0"), Some(24));
        assert_eq!(parse_signal_strength("+CSQ: 99,99"), Some(99));
        assert_eq!(parse_signal_strength("no signal here"), None);
    }

    #[test]
    fn parses_creg_second_field() {
        assert_eq!(parse_network_status("+CREG: 0,1"), Some("Registered Home"));
        assert_eq!(parse_network_status("+CREG: 0,5"), Some("Registered Roaming"));
        assert_eq!(parse_network_status("+CREG: 0,2"), Some("Searching"));
        assert_eq!(parse_network_status("+CREG: 0,4"), None);
    }

    #[test]
    fn extracts_operator_quoted() {
        assert_eq!(
            first_quoted("+COPS: 0,0,\"CHINA MOBILE\",7").as_deref(),
            Some("CHINA MOBILE")
        );
        assert_eq!(first_quoted("+COPS: 0"), None);
    }

    #[test]
    fn iccid_requires_18_to_22_digits() {
        assert_eq!(
            extract_iccid("+CCID: 89860012345678901234").as_deref(),
            Some("89860012345678901234")
        );
        assert_eq!(extract_iccid("^ICCID: 898600123456789012").as_deref(), Some("898600123456789012"));
        assert_eq!(extract_iccid("+CCID: 12345"), None);
        assert_eq!(extract_iccid("860000000000000"), None); // 15 位是 IMEI
    }

    #[test]
    fn own_number_prefers_dialable_quoted() {
        assert_eq!(
            parse_own_number("+CNUM: \"\",\"+8613800138000\",145").as_deref(),
            Some("+8613800138000")
        );
        assert_eq!(
            parse_own_number("+CNUM: \"own\",\"13800138000\",129").as_deref(),
            Some("13800138000")
        );
        assert_eq!(parse_own_number("+CNUM: \"\",\"\",129"), None);
    }
}
