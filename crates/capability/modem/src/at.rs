//! AT 命令请求/响应层
//!
//! 线协议：命令 + `\r` 写出，轮询读取累积，直到出现可识别的终止符
//! （`OK` / `ERROR` / `+CME ERROR` / `+CMS ERROR`，分隔符宽容）。
//! 载荷提取：去掉回显与终止符行后按单个空格拼接。

use crate::error::ModemError;
use crate::io::SerialLink;
use std::time::{Duration, Instant};

/// 轮询间隔。
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 响应中是否已出现终止符。按行判定，兼容 `\rOK\r`、`\nOK\n`、`\r\nOK\r\n`。
pub fn contains_terminator(text: &str) -> bool {
    text.split(['\r', '\n']).any(|line| {
        let line = line.trim();
        line == "OK"
            || line == "ERROR"
            || line.starts_with("+CME ERROR")
            || line.starts_with("+CMS ERROR")
    })
}

/// 响应是否为错误终止。
pub fn is_error_response(text: &str) -> bool {
    text.split(['\r', '\n']).any(|line| {
        let line = line.trim();
        line == "ERROR" || line.starts_with("+CME ERROR") || line.starts_with("+CMS ERROR")
    })
}

fn is_terminator_line(line: &str) -> bool {
    line == "OK"
        || line == "ERROR"
        || line.starts_with("+CME ERROR")
        || line.starts_with("+CMS ERROR")
}

/// 载荷 = 非空行 − 命令回显 − 终止符行，按单个空格拼接。
pub fn extract_payload(raw: &str, command: &str) -> String {
    let command = command.trim();
    raw.split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| *line != command)
        .filter(|line| !is_terminator_line(line))
        .collect::<Vec<_>>()
        .join(" ")
}

/// 发送一条 AT 命令并等待终止符。
///
/// 丢弃两侧缓冲后写 `cmd + "\r"`，每 50 ms 读一次累积，直到出现终止符
/// 或超时。超时返回 [`ModemError::Timeout`]，已累积内容丢弃。
pub fn send_command(
    link: &mut dyn SerialLink,
    command: &str,
    timeout: Duration,
) -> Result<String, ModemError> {
    link.clear_buffers()?;
    link.write_all(format!("{command}\r").as_bytes())?;
    collect_response(link, command, timeout)
}

/// 轮询累积响应直到终止符或超时（命令已写出的场合）。
pub fn collect_response(
    link: &mut dyn SerialLink,
    command: &str,
    timeout: Duration,
) -> Result<String, ModemError> {
    let deadline = Instant::now() + timeout;
    let mut collected = String::new();
    loop {
        let chunk = link.read_available()?;
        if !chunk.is_empty() {
            collected.push_str(&String::from_utf8_lossy(&chunk));
            if contains_terminator(&collected) {
                return Ok(collected);
            }
        }
        if Instant::now() >= deadline {
            return Err(ModemError::Timeout(command.to_string()));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminator_is_delimiter_tolerant() {
        assert!(contains_terminator("\r\nOK\r\n"));
        assert!(contains_terminator("\rOK\r"));
        assert!(contains_terminator("\nOK\n"));
        assert!(contains_terminator("AT\r\r\nERROR\r\n"));
        assert!(contains_terminator("\r\n+CME ERROR: 10\r\n"));
        assert!(contains_terminator("\r\n+CMS ERROR: 321\r\n"));
        assert!(!contains_terminator("\r\n+CSQ: 24,0\r\n"));
        // OK 作为其他单词的一部分不算终止
        assert!(!contains_terminator("BROKEN"));
    }

    #[test]
    fn error_detection() {
        assert!(is_error_response("\r\nERROR\r\n"));
        assert!(is_error_response("\r\n+CMS ERROR: 500\r\n"));
        assert!(!is_error_response("\r\nOK\r\n"));
    }

    #[test]
    fn payload_strips_echo_and_terminators() {
        let raw = "AT+CSQ\r\r\n+CSQ: 24,0\r\n\r\nOK\r\n";
        assert_eq!(extract_payload(raw, "AT+CSQ"), "+CSQ: 24,0");

        let raw = "AT+CGMI\r\r\nQuectel\r\nEC20\r\nOK\r\n";
        assert_eq!(extract_payload(raw, "AT+CGMI"), "Quectel EC20");
    }
}
