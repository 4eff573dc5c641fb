//! 主动上报（URC）流解析。
//!
//! 监听缓冲按顺序检查三类片段：
//! 1. 来电片段 `RING` / `+CLIP: "<caller>",...`
//! 2. 存储短信通知 `+CMTI: "<mem>",<index>`
//! 3. 直推短信 `+CMT: "<sender>",,"<timestamp>"` + 内容
//!
//! CMT 头已出现而内容未完整时不消费缓冲，等待更多数据——这是唯一
//! 必须等待的场景。

use crate::ucs2::decode_ucs2_if_needed;
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

fn clip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\+CLIP:\s*"([^"]*)""#).expect("clip regex"))
}

fn cmti_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\+CMTI:\s*"([^"]+)"\s*,\s*(\d+)"#).expect("cmti regex"))
}

fn cmt_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // +CMT: "<sender>"[,<alpha>],"<timestamp>"
    RE.get_or_init(|| {
        Regex::new(r#"\+CMT:\s*"([^"]*)"\s*,[^,"]*,\s*"([^"]*)"[^\r\n]*\r?\n"#).expect("cmt regex")
    })
}

/// 缓冲是否含有来电片段。
pub fn has_incoming_call(buffer: &str) -> bool {
    buffer.contains("RING") || buffer.contains("+CLIP:")
}

/// 提取最后一个 `+CLIP:` 之后的首个引号串作为主叫号码。
pub fn last_clip_caller(buffer: &str) -> Option<String> {
    clip_re()
        .captures_iter(buffer)
        .last()
        .map(|caps| caps[1].to_string())
        .filter(|caller| !caller.is_empty())
}

/// 存储短信通知。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmtiNotice {
    pub storage: String,
    pub index: u32,
    /// 通知在缓冲中的结束偏移（消费到此为止）。
    pub end: usize,
}

/// 解析首个 `+CMTI` 通知。
pub fn parse_cmti(buffer: &str) -> Option<CmtiNotice> {
    let caps = cmti_re().captures(buffer)?;
    let whole = caps.get(0)?;
    let index = caps[2].parse::<u32>().ok()?;
    Some(CmtiNotice {
        storage: caps[1].to_string(),
        index,
        end: whole.end(),
    })
}

/// 直推短信解析结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmtParse {
    /// 无 CMT 头。
    None,
    /// 头已出现但内容未到齐，不消费缓冲。
    Incomplete,
    /// 完整一条。
    Complete {
        sender: String,
        timestamp: String,
        content: String,
        /// 消费到此偏移。
        end: usize,
    },
}

/// 解析缓冲中首个完整的 `+CMT` 推送。
///
/// 内容从头行换行后开始，跳过紧邻的空行，至下一个空行、下一个
/// `+CMT`、`OK` 行或缓冲尾（须以换行收尾）结束。
pub fn parse_cmt(buffer: &str) -> CmtParse {
    let Some(caps) = cmt_header_re().captures(buffer) else {
        if buffer.contains("+CMT:") {
            // 头行本身尚未收完
            return CmtParse::Incomplete;
        }
        return CmtParse::None;
    };
    let Some(whole) = caps.get(0) else {
        return CmtParse::None;
    };
    let sender = caps[1].to_string();
    let timestamp = caps[2].to_string();

    let rest = &buffer[whole.end()..];
    let mut content_lines: Vec<&str> = Vec::new();
    let mut consumed = whole.end();
    let mut saw_terminator = false;
    let mut offset = 0usize;
    for segment in rest.split_inclusive('\n') {
        let line = segment.trim_end_matches(['\r', '\n']);
        let complete_line = segment.ends_with('\n');
        if !complete_line {
            // 行未收完：若已有内容则视为内容仍在路上
            break;
        }
        offset += segment.len();
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if content_lines.is_empty() {
                // 头与内容之间的空行
                consumed = whole.end() + offset;
                continue;
            }
            saw_terminator = true;
            consumed = whole.end() + offset;
            break;
        }
        if trimmed.starts_with("+CMT:") || trimmed == "OK" {
            saw_terminator = true;
            // 终止行不消费，留给下一轮
            break;
        }
        content_lines.push(trimmed);
        consumed = whole.end() + offset;
        saw_terminator = true;
    }

    if content_lines.is_empty() || !saw_terminator {
        return CmtParse::Incomplete;
    }
    let content = decode_ucs2_if_needed(&content_lines.join("\n"));
    CmtParse::Complete {
        sender,
        timestamp,
        content,
        end: consumed,
    }
}

/// `AT+CMGR`/`AT+CMGL` 响应解析出的存储短信。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSms {
    pub sender: String,
    pub timestamp: Option<String>,
    pub content: String,
}

/// 解析读取存储短信的响应。
///
/// 头行（`+CMGR:` / `+CMGL:`）里取发送方与原始时间戳；其后的非空、
/// 非 `OK` 行以 `\n` 拼接为内容。
pub fn parse_stored_sms(response: &str) -> Option<StoredSms> {
    let mut lines = response.split(['\r', '\n']).map(str::trim);
    let header = lines.find(|line| line.starts_with("+CMGR:") || line.starts_with("+CMGL:"))?;

    let quoted: Vec<&str> = quoted_strings(header);
    let sender = quoted
        .iter()
        .find(|value| looks_like_number(value))
        .map(|value| value.to_string())?;
    let timestamp = quoted
        .iter()
        .find(|value| looks_like_timestamp(value))
        .map(|value| value.to_string());

    let content_lines: Vec<&str> = lines
        .filter(|line| !line.is_empty())
        .filter(|line| *line != "OK")
        .filter(|line| !line.starts_with("+CMGR:") && !line.starts_with("+CMGL:"))
        .collect();
    if content_lines.is_empty() {
        return None;
    }
    Some(StoredSms {
        sender,
        timestamp,
        content: decode_ucs2_if_needed(&content_lines.join("\n")),
    })
}

fn quoted_strings(line: &str) -> Vec<&str> {
    let mut values = Vec::new();
    let mut rest = line;
    while let Some(start) = rest.find('"') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('"') else { break };
        values.push(&after[..end]);
        rest = &after[end + 1..];
    }
    values
}

fn looks_like_number(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_digit() || ch == '+')
        && value.chars().any(|ch| ch.is_ascii_digit())
}

fn looks_like_timestamp(value: &str) -> bool {
    value.contains('/') && value.contains(':')
}

/// 解析模块时间戳 `YY/MM/DD,HH:MM:SS±TZ` 为 UTC。
///
/// `YY` 记为 2000+YY；时区后缀（刻度为一刻钟）与缺失后缀一律按
/// 本地即 UTC 处理（与入库展示口径一致）。
pub fn parse_sms_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim().trim_matches('"');
    let (date_part, time_part) = raw.split_once(',')?;

    let mut date_fields = date_part.split('/');
    let year = 2000 + date_fields.next()?.trim().parse::<i32>().ok()?;
    let month = date_fields.next()?.trim().parse::<u32>().ok()?;
    let day = date_fields.next()?.trim().parse::<u32>().ok()?;

    // 去掉 ±TZ 后缀
    let time_text = match time_part.rfind(['+', '-']) {
        Some(position) if position > 0 => &time_part[..position],
        _ => time_part,
    };
    let mut time_fields = time_text.split(':');
    let hour = time_fields.next()?.trim().parse::<u32>().ok()?;
    let minute = time_fields.next()?.trim().parse::<u32>().ok()?;
    let second = time_fields.next()?.trim().parse::<u32>().ok()?;

    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_takes_last_caller() {
        let buffer = "RING\r\n+CLIP: \"+15550001111\",145\r\nRING\r\n+CLIP: \"+16660002222\",145\r\n";
        assert!(has_incoming_call(buffer));
        assert_eq!(last_clip_caller(buffer).as_deref(), Some("+16660002222"));
    }

    #[test]
    fn ring_without_clip_has_no_caller() {
        assert!(has_incoming_call("RING\r\n"));
        assert_eq!(last_clip_caller("RING\r\n"), None);
    }

    #[test]
    fn cmti_parses_storage_and_index() {
        let notice = parse_cmti("\r\n+CMTI: \"SM\",7\r\n").expect("notice");
        assert_eq!(notice.storage, "SM");
        assert_eq!(notice.index, 7);
    }

    #[test]
    fn cmt_complete_push_is_parsed_and_decoded() {
        // 场景 S1 的字面输入
        let buffer = "+CMT: \"+8613800138000\",,\"26/01/23,14:30:45+32\"\r\n\r\n4F604F60\r\n";
        match parse_cmt(buffer) {
            CmtParse::Complete {
                sender,
                timestamp,
                content,
                end,
            } => {
                assert_eq!(sender, "+8613800138000");
                assert_eq!(timestamp, "26/01/23,14:30:45+32");
                assert_eq!(content, "你你");
                assert_eq!(end, buffer.len());
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn cmt_incomplete_content_waits() {
        let buffer = "+CMT: \"+8613800138000\",,\"26/01/23,14:30:45+32\"\r\n4F60";
        assert_eq!(parse_cmt(buffer), CmtParse::Incomplete);

        let buffer = "+CMT: \"+861380013";
        assert_eq!(parse_cmt(buffer), CmtParse::Incomplete);
    }

    #[test]
    fn cmt_plain_text_single_newline() {
        let buffer = "\r\n+CMT: \"+15551234567\",,\"25/06/01,10:00:00+00\"\r\nHello world\r\n";
        match parse_cmt(buffer) {
            CmtParse::Complete {
                content, sender, ..
            } => {
                assert_eq!(sender, "+15551234567");
                assert_eq!(content, "Hello world");
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn stored_sms_parses_cmgr_header() {
        // 场景 S2 的模块响应
        let response =
            "+CMGR: \"REC UNREAD\",\"+15551234567\",,\"25/06/01,10:00:00+00\"\r\nHello\r\nOK\r\n";
        let stored = parse_stored_sms(response).expect("stored sms");
        assert_eq!(stored.sender, "+15551234567");
        assert_eq!(stored.timestamp.as_deref(), Some("25/06/01,10:00:00+00"));
        assert_eq!(stored.content, "Hello");
    }

    #[test]
    fn stored_sms_parses_cmgl_and_multiline() {
        let response = "+CMGL: 3,\"REC UNREAD\",\"10086\",,\"25/06/01,10:00:00+00\"\r\nline one\r\nline two\r\nOK\r\n";
        let stored = parse_stored_sms(response).expect("stored sms");
        assert_eq!(stored.sender, "10086");
        assert_eq!(stored.content, "line one\nline two");
    }

    #[test]
    fn stored_sms_empty_response_is_none() {
        assert!(parse_stored_sms("\r\nOK\r\n").is_none());
        assert!(parse_stored_sms("").is_none());
    }

    #[test]
    fn timestamp_local_time_recorded_as_utc() {
        let parsed = parse_sms_timestamp("26/01/23,14:30:45+32").expect("timestamp");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 1, 23, 14, 30, 45).unwrap());

        let parsed = parse_sms_timestamp("25/06/01,10:00:00+00").expect("timestamp");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());

        // 负时区与缺失时区
        let parsed = parse_sms_timestamp("25/06/01,10:00:00-20").expect("timestamp");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());
        let parsed = parse_sms_timestamp("25/06/01,10:00:00").expect("timestamp");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn malformed_timestamp_is_none() {
        assert!(parse_sms_timestamp("garbage").is_none());
        assert!(parse_sms_timestamp("26/13/99,99:99:99+00").is_none());
    }
}
