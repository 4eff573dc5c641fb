//! 短信发送事务
//!
//! 单次事务：暂停接收监听 → 等内核释放句柄 → 打开（或复用缓存的）
//! 115200 8-N-1 句柄 → 初始化 → `AT+CMGS` 对话 → 内容 + Ctrl-Z →
//! 等 `+CMGS`/`OK` 或错误 → 恢复监听。恢复由暂停令牌的 Drop 保证，
//! 任何退出路径都会执行。
//!
//! 只做一次 AT 层尝试并如实报告结局；重试属于上层工作流。

use crate::at;
use crate::io::{OpenSettings, SerialLink, SerialOpener};
use crate::receiver::SmsReceiver;
use crate::types::SendReport;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 发送参数（缺省值面向真实硬件，测试可缩短）。
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// 发送句柄波特率。
    pub baud_rate: u32,
    /// 暂停监听后等内核释放句柄的时间。
    pub pause_settle: Duration,
    /// 新开句柄后的稳定时间。
    pub open_settle: Duration,
    /// 初始化命令间隔。
    pub init_command_gap: Duration,
    /// 初始化命令超时。
    pub command_timeout: Duration,
    /// `>` 提示符等待上限。
    pub prompt_timeout: Duration,
    /// `+CMGS` 完成等待上限。
    pub complete_timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            pause_settle: Duration::from_secs(1),
            open_settle: Duration::from_millis(500),
            init_command_gap: Duration::from_millis(300),
            command_timeout: Duration::from_secs(3),
            prompt_timeout: Duration::from_secs(10),
            complete_timeout: Duration::from_secs(30),
        }
    }
}

/// 短信发送器。按端口缓存句柄，重复发送复用；shutdown 时释放。
pub struct SmsSender {
    opener: Arc<dyn SerialOpener>,
    receiver: Arc<SmsReceiver>,
    config: SenderConfig,
    cache: Mutex<HashMap<String, Box<dyn SerialLink>>>,
}

impl SmsSender {
    pub fn new(
        opener: Arc<dyn SerialOpener>,
        receiver: Arc<SmsReceiver>,
        config: SenderConfig,
    ) -> Self {
        Self {
            opener,
            receiver,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// 发送一条短信。
    pub fn send_sms(&self, com_port: &str, target_number: &str, message_content: &str) -> SendReport {
        if com_port.trim().is_empty() {
            return SendReport::failed("COM port is required");
        }
        if target_number.trim().is_empty() {
            return SendReport::failed("target number is required");
        }
        if message_content.is_empty() {
            return SendReport::failed("message content is required");
        }

        // 1. 暂停监听；令牌 Drop 即恢复，所有退出路径共用
        let pause_token = self.receiver.pause(com_port).ok();
        if let Some(token) = &pause_token {
            if token.paused_listener() {
                // 等内核释放监听句柄，总预算即 pause_settle；释放早则提前继续
                let deadline = Instant::now() + self.config.pause_settle;
                while !token.listener_released() && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(20));
                }
            }
        }

        let report = self.send_on_port(com_port, target_number, message_content);
        if !report.success {
            // 失败的句柄不复用，下次重开
            self.drop_cached(com_port);
        }
        report
        // pause_token 在此 Drop：监听恢复并重跑初始化序列
    }

    /// 释放全部缓存句柄。
    pub fn shutdown(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|err| err.into_inner());
        let count = cache.len();
        cache.clear();
        if count > 0 {
            info!(count, "sender port cache released");
        }
    }

    fn send_on_port(&self, com_port: &str, target_number: &str, content: &str) -> SendReport {
        let mut cache = self.cache.lock().unwrap_or_else(|err| err.into_inner());
        let link = match cache.entry(com_port.to_string()) {
            std::collections::hash_map::Entry::Occupied(entry) => {
                debug!(port = com_port, "reusing cached sender handle");
                entry.into_mut()
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                let mut settings = OpenSettings::new(self.config.baud_rate);
                settings.read_timeout = Duration::from_millis(1500);
                match self.opener.open(com_port, &settings) {
                    Ok(link) => {
                        std::thread::sleep(self.config.open_settle);
                        let link = entry.insert(link);
                        if let Err(err) = initialize_send_settings(link.as_mut(), &self.config) {
                            return SendReport::failed(format!("init failed: {err}"));
                        }
                        link
                    }
                    Err(err) => {
                        return SendReport::failed(format!("open {com_port} failed: {err}"));
                    }
                }
            }
        };

        run_cmgs_dialog(link.as_mut(), target_number, content, &self.config)
    }

    fn drop_cached(&self, com_port: &str) {
        let mut cache = self.cache.lock().unwrap_or_else(|err| err.into_inner());
        cache.remove(com_port);
    }
}

/// 发送初始化：`AT`（无 OK 仅告警）→ `ATE0` → `AT+CMGF=1` →
/// `AT+CSCS="UCS2"`，命令间隔 300 ms。
fn initialize_send_settings(
    link: &mut dyn SerialLink,
    config: &SenderConfig,
) -> Result<(), crate::error::ModemError> {
    match at::send_command(link, "AT", config.command_timeout) {
        Ok(_) => {}
        Err(err) => warn!(error = %err, "modem not answering AT, continuing"),
    }
    std::thread::sleep(config.init_command_gap);
    for command in ["ATE0", "AT+CMGF=1", "AT+CSCS=\"UCS2\""] {
        at::send_command(link, command, config.command_timeout)?;
        std::thread::sleep(config.init_command_gap);
    }
    Ok(())
}

/// `AT+CMGS` 对话：等 `>` 提示符，写内容 + Ctrl-Z，等 `+CMGS`/`OK`。
fn run_cmgs_dialog(
    link: &mut dyn SerialLink,
    target_number: &str,
    content: &str,
    config: &SenderConfig,
) -> SendReport {
    if !content.is_ascii() {
        // UCS2 模式下按原样写出，部分模块要求十六进制编码，可能乱码
        warn!("non-ascii content sent as-is under UCS2 charset, may be garbled");
    }

    if let Err(err) = link.clear_buffers() {
        return SendReport::failed(format!("clear buffers failed: {err}"));
    }
    if let Err(err) = link.write_all(format!("AT+CMGS=\"{target_number}\"\r").as_bytes()) {
        return SendReport::failed(format!("cmgs write failed: {err}"));
    }

    // 等 `>` 提示符，出现错误立即中止
    let deadline = Instant::now() + config.prompt_timeout;
    let mut collected = String::new();
    loop {
        match link.read_available() {
            Ok(chunk) if !chunk.is_empty() => {
                collected.push_str(&String::from_utf8_lossy(&chunk));
                if at::is_error_response(&collected) {
                    return SendReport::failed(format!("cmgs rejected: {}", collected.trim()));
                }
                if collected.contains('>') {
                    break;
                }
            }
            Ok(_) => {}
            Err(err) => return SendReport::failed(format!("prompt read failed: {err}")),
        }
        if Instant::now() >= deadline {
            return SendReport::failed("timeout waiting for > prompt");
        }
        std::thread::sleep(at::POLL_INTERVAL);
    }

    // 内容 + Ctrl-Z
    let mut payload = content.as_bytes().to_vec();
    payload.push(0x1A);
    if let Err(err) = link.write_all(&payload) {
        return SendReport::failed(format!("content write failed: {err}"));
    }

    // 完成等待：`+CMGS:` 且 `OK` 为成功，错误终止为失败，否则超时
    let deadline = Instant::now() + config.complete_timeout;
    let mut collected = String::new();
    loop {
        match link.read_available() {
            Ok(chunk) if !chunk.is_empty() => {
                collected.push_str(&String::from_utf8_lossy(&chunk));
                if at::is_error_response(&collected) {
                    return SendReport::failed(format!("send failed: {}", collected.trim()));
                }
                if collected.contains("+CMGS:") && collected.contains("OK") {
                    let reference = parse_message_reference(&collected);
                    info!(reference = reference.as_deref().unwrap_or("-"), "sms sent");
                    return SendReport::ok(reference);
                }
            }
            Ok(_) => {}
            Err(err) => return SendReport::failed(format!("completion read failed: {err}")),
        }
        if Instant::now() >= deadline {
            return SendReport::failed("timeout waiting for +CMGS completion");
        }
        std::thread::sleep(at::POLL_INTERVAL);
    }
}

/// `+CMGS: 12` → "12"。
fn parse_message_reference(text: &str) -> Option<String> {
    let position = text.find("+CMGS:")?;
    let rest = text[position + 6..].trim_start();
    let digits: String = rest
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .collect();
    if digits.is_empty() { None } else { Some(digits) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_reference_is_extracted() {
        assert_eq!(
            parse_message_reference("\r\n+CMGS: 42\r\n\r\nOK\r\n").as_deref(),
            Some("42")
        );
        assert_eq!(parse_message_reference("\r\nOK\r\n"), None);
    }
}
