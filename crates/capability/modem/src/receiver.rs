//! 短信接收监听器
//!
//! 每个监听端口一条独立线程：打开串口、跑初始化序列、轮询读取并累积
//! 到缓冲，按顺序检查三类片段（来电 / +CMTI / +CMT）。事件严格按到达
//! 顺序发出；跨端口无顺序保证。
//!
//! 初始化序列（打开与恢复时都执行）：`ATE0` → `AT+CMGF=1` →
//! `AT+CNMI=2,2,0,0,0` → `AT+CSCS="GSM"`，命令间隔 200 ms，单条失败
//! 仅记日志不阻断挂载。
//!
//! 暂停/恢复：发送方经 [`crate::session::PauseToken`] 暂停；监听线程
//! 看到暂停标志后在锁内丢弃句柄（关闭 OS 句柄），恢复后重开并重跑
//! 初始化序列。

use crate::at;
use crate::error::ModemError;
use crate::io::{OpenSettings, SerialOpener};
use crate::session::{ClipCache, PauseToken, PortRuntime};
use crate::types::{CallHangup, HangupPolicy, HangupReason, ListenPort, SmsReceived};
use crate::urc::{self, CmtParse};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 来电片段缓冲水位：无完整 +CLIP 时超过即清空。
const CALL_BUFFER_WATERMARK: usize = 4096;
/// 缓冲总水位：+CMT 等不齐内容时超过即清空，防泄漏。
const BUFFER_WATERMARK: usize = 10_000;
/// 主叫缓存 TTL。
const CLIP_CACHE_TTL: Duration = Duration::from_secs(120);
/// raw_line 中尾部与数据块的截断长度。
const RAW_LINE_LIMIT: usize = 512;

/// 事件回调。作为构造参数存在，"未挂接处理器" 无从表达。
pub struct ReceiverEvents {
    pub on_sms_received: Box<dyn Fn(SmsReceived) + Send + Sync>,
    pub on_call_hangup: Box<dyn Fn(CallHangup) + Send + Sync>,
}

/// 监听参数（缺省值面向真实硬件，测试可缩短）。
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub hangup: HangupPolicy,
    /// 无数据时的轮询间隔。
    pub poll_interval: Duration,
    /// 初始化命令间隔。
    pub init_command_gap: Duration,
    /// 命令超时（CMGR/CMGD 等）。
    pub command_timeout: Duration,
    /// 打开失败后的重试间隔。
    pub reopen_delay: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            hangup: HangupPolicy::default(),
            poll_interval: Duration::from_millis(50),
            init_command_gap: Duration::from_millis(200),
            command_timeout: Duration::from_secs(5),
            reopen_delay: Duration::from_secs(2),
        }
    }
}

/// 短信接收器。
pub struct SmsReceiver {
    opener: Arc<dyn SerialOpener>,
    config: ReceiverConfig,
    events: Arc<ReceiverEvents>,
    ports: RwLock<HashMap<String, Arc<PortRuntime>>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl SmsReceiver {
    pub fn new(
        opener: Arc<dyn SerialOpener>,
        config: ReceiverConfig,
        events: ReceiverEvents,
    ) -> Self {
        Self {
            opener,
            config,
            events: Arc::new(events),
            ports: RwLock::new(HashMap::new()),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// 启动监听。已在监听的端口幂等跳过。
    pub fn start_listening(&self, ports: &[ListenPort]) {
        for port in ports {
            let runtime = {
                let mut map = self.ports.write().unwrap_or_else(|err| err.into_inner());
                if let Some(existing) = map.get(&port.port_name) {
                    if !existing.is_stopping() {
                        info!(port = %port.port_name, "listener already running, skipped");
                        continue;
                    }
                }
                let runtime = Arc::new(PortRuntime::new(port.port_name.clone(), port.baud_rate));
                map.insert(port.port_name.clone(), runtime.clone());
                runtime
            };

            let opener = self.opener.clone();
            let config = self.config.clone();
            let events = self.events.clone();
            let handle = std::thread::spawn(move || {
                listener_loop(opener, config, events, runtime);
            });
            self.threads
                .lock()
                .unwrap_or_else(|err| err.into_inner())
                .push(handle);
            info!(port = %port.port_name, baud = port.baud_rate, "sms listener started");
        }
    }

    /// 停止全部监听，等待所有线程释放端口后返回。
    pub fn stop(&self) {
        {
            let map = self.ports.read().unwrap_or_else(|err| err.into_inner());
            for runtime in map.values() {
                runtime.stop.store(true, Ordering::Release);
            }
        }
        let handles: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self.threads.lock().unwrap_or_else(|err| err.into_inner()),
        );
        for handle in handles {
            let _ = handle.join();
        }
        self.ports
            .write()
            .unwrap_or_else(|err| err.into_inner())
            .clear();
        info!("sms receiver stopped");
    }

    /// 端口是否在监听。
    pub fn is_listening(&self, port_name: &str) -> bool {
        let map = self.ports.read().unwrap_or_else(|err| err.into_inner());
        map.get(port_name)
            .map(|runtime| !runtime.is_stopping())
            .unwrap_or(false)
    }

    /// 暂停监听，返回的令牌 Drop 时恢复（错误路径同样恢复）。
    ///
    /// 端口未在监听时返回 Err，发送方据此直接占用端口。
    pub fn pause(&self, port_name: &str) -> Result<PauseToken, ModemError> {
        let runtime = {
            let map = self.ports.read().unwrap_or_else(|err| err.into_inner());
            map.get(port_name).cloned()
        };
        let Some(runtime) = runtime else {
            return Err(ModemError::NotListening(port_name.to_string()));
        };
        if runtime.is_stopping() {
            return Err(ModemError::NotListening(port_name.to_string()));
        }
        Ok(PauseToken::acquire(runtime))
    }
}

/// 监听主循环：外层负责 打开+初始化，内层轮询读取。
fn listener_loop(
    opener: Arc<dyn SerialOpener>,
    config: ReceiverConfig,
    events: Arc<ReceiverEvents>,
    runtime: Arc<PortRuntime>,
) {
    'reopen: loop {
        if runtime.is_stopping() {
            break;
        }
        if runtime.is_paused() {
            std::thread::sleep(config.poll_interval);
            continue;
        }

        let mut settings = OpenSettings::new(runtime.baud_rate);
        settings.read_timeout = Duration::from_millis(1500);
        let mut link = match opener.open(&runtime.port_name, &settings) {
            Ok(link) => link,
            Err(err) => {
                warn!(port = %runtime.port_name, error = %err, "listener open failed");
                sleep_until_flag(&runtime, config.reopen_delay, config.poll_interval);
                continue;
            }
        };
        initialize_sms_settings(link.as_mut(), &config, &runtime.port_name);
        {
            let mut guard = runtime.link.lock().unwrap_or_else(|err| err.into_inner());
            *guard = Some(link);
        }
        runtime.released.store(false, Ordering::Release);
        debug!(port = %runtime.port_name, "listener attached");

        let mut buffer = String::new();
        loop {
            if runtime.is_stopping() {
                release_link(&runtime);
                break 'reopen;
            }
            if runtime.is_paused() {
                // 先关句柄再让出端口，发送方随后自行打开
                release_link(&runtime);
                debug!(port = %runtime.port_name, "listener paused, handle released");
                while runtime.is_paused() && !runtime.is_stopping() {
                    std::thread::sleep(config.poll_interval);
                }
                if runtime.is_stopping() {
                    break 'reopen;
                }
                debug!(port = %runtime.port_name, "listener resuming");
                continue 'reopen;
            }

            let chunk = {
                let mut guard = runtime.link.lock().unwrap_or_else(|err| err.into_inner());
                match guard.as_mut() {
                    Some(link) => link.read_available(),
                    None => {
                        drop(guard);
                        continue 'reopen;
                    }
                }
            };
            match chunk {
                Ok(bytes) if !bytes.is_empty() => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    store_truncated(&runtime.last_chunk, &text);
                    buffer.push_str(&text);
                    store_truncated(&runtime.last_tail, tail(&buffer, RAW_LINE_LIMIT));
                    process_buffer(&mut buffer, &runtime, &config, &events);
                }
                Ok(_) => std::thread::sleep(config.poll_interval),
                Err(err) => {
                    warn!(port = %runtime.port_name, error = %err, "listener read failed");
                    release_link(&runtime);
                    sleep_until_flag(&runtime, config.reopen_delay, config.poll_interval);
                    continue 'reopen;
                }
            }
        }
    }
    release_link(&runtime);
    debug!(port = %runtime.port_name, "listener exited");
}

/// 初始化序列。单条失败仅记日志。
fn initialize_sms_settings(
    link: &mut dyn crate::io::SerialLink,
    config: &ReceiverConfig,
    port_name: &str,
) {
    for command in ["ATE0", "AT+CMGF=1", "AT+CNMI=2,2,0,0,0", "AT+CSCS=\"GSM\""] {
        if let Err(err) = at::send_command(link, command, config.command_timeout) {
            warn!(port = port_name, command, error = %err, "sms init command failed");
        }
        std::thread::sleep(config.init_command_gap);
    }
}

/// 缓冲检查：来电片段 → +CMTI → +CMT，依序进行。
fn process_buffer(
    buffer: &mut String,
    runtime: &Arc<PortRuntime>,
    config: &ReceiverConfig,
    events: &Arc<ReceiverEvents>,
) {
    // 1. 来电片段
    if urc::has_incoming_call(buffer) {
        let caller = urc::last_clip_caller(buffer);
        if let Some(caller) = &caller {
            let mut clip = runtime.last_clip.lock().unwrap_or_else(|err| err.into_inner());
            *clip = Some(ClipCache {
                caller: caller.clone(),
                cached_at: Instant::now(),
            });
        }
        spawn_auto_hangup(runtime.clone(), config.hangup.clone(), events.clone());
        if caller.is_some() {
            buffer.clear();
        } else if buffer.len() > CALL_BUFFER_WATERMARK {
            buffer.clear();
        }
        if buffer.is_empty() {
            return;
        }
    }

    // 2. 存储短信通知
    while let Some(notice) = urc::parse_cmti(buffer) {
        debug!(port = %runtime.port_name, storage = %notice.storage, index = notice.index, "cmti notice");
        if let Some(event) = read_stored_sms(runtime, config, notice.index) {
            (events.on_sms_received)(event);
        }
        buffer.drain(..notice.end);
    }

    // 3. 直推短信
    loop {
        match urc::parse_cmt(buffer) {
            CmtParse::Complete {
                sender,
                timestamp,
                content,
                end,
            } => {
                let received_time =
                    urc::parse_sms_timestamp(&timestamp).unwrap_or_else(Utc::now);
                (events.on_sms_received)(SmsReceived {
                    com_port: runtime.port_name.clone(),
                    sender_number: sender,
                    message_content: content,
                    received_time,
                    sms_timestamp: Some(timestamp),
                });
                buffer.drain(..end);
            }
            CmtParse::Incomplete => {
                // 头在内容未到齐：等待，但受总水位约束防泄漏
                if buffer.len() > BUFFER_WATERMARK {
                    warn!(port = %runtime.port_name, "urc buffer overflow, cleared");
                    buffer.clear();
                }
                return;
            }
            CmtParse::None => break,
        }
    }

    // 杂散输出按水位裁剪：保留最后一个终止符之后的部分
    if buffer.len() > BUFFER_WATERMARK {
        let kept = buffer
            .rfind("OK")
            .map(|position| buffer.split_off(position + 2))
            .unwrap_or_default();
        *buffer = kept;
        if buffer.len() > BUFFER_WATERMARK {
            buffer.clear();
        }
    }
}

/// 读取存储短信：`AT+CMGR` → 失败回退 `AT+CMGL="ALL"` → `"REC UNREAD"`，
/// 成功解析后删除原始短信。整个对话持有端口命令互斥锁。
fn read_stored_sms(
    runtime: &Arc<PortRuntime>,
    config: &ReceiverConfig,
    index: u32,
) -> Option<SmsReceived> {
    let mut guard = runtime.link.lock().unwrap_or_else(|err| err.into_inner());
    let link = guard.as_mut()?;

    let mut stored = None;
    let read_command = format!("AT+CMGR={index}");
    match at::send_command(link.as_mut(), &read_command, config.command_timeout) {
        Ok(response) => stored = urc::parse_stored_sms(&response),
        Err(err) => debug!(port = %runtime.port_name, error = %err, "cmgr failed"),
    }
    if stored.is_none() {
        for fallback in ["AT+CMGL=\"ALL\"", "AT+CMGL=\"REC UNREAD\""] {
            match at::send_command(link.as_mut(), fallback, config.command_timeout) {
                Ok(response) => {
                    stored = urc::parse_stored_sms(&response);
                    if stored.is_some() {
                        break;
                    }
                }
                Err(err) => debug!(port = %runtime.port_name, error = %err, "cmgl failed"),
            }
        }
    }

    let stored = stored?;
    let received_time = stored
        .timestamp
        .as_deref()
        .and_then(urc::parse_sms_timestamp)
        .unwrap_or_else(Utc::now);
    let event = SmsReceived {
        com_port: runtime.port_name.clone(),
        sender_number: stored.sender,
        message_content: stored.content,
        received_time,
        sms_timestamp: stored.timestamp,
    };

    // 消费后删除，失败不影响已发出的事件
    let delete_command = format!("AT+CMGD={index}");
    if let Err(err) = at::send_command(link.as_mut(), &delete_command, config.command_timeout) {
        warn!(port = %runtime.port_name, index, error = %err, "cmgd failed");
    }
    Some(event)
}

/// 异步自动挂断。
///
/// 流程：延迟 → 取端口命令互斥锁 → 冷却检查（锁内预占，任意冷却窗口
/// 至多一次）→ 解析主叫 → 白名单放行 → 写 `ATH\r`，150 ms 后补写
/// `AT+CHUP\r`（只写不读，避免与监听读循环竞争）→ 释放锁 → 发事件。
fn spawn_auto_hangup(
    runtime: Arc<PortRuntime>,
    policy: HangupPolicy,
    events: Arc<ReceiverEvents>,
) {
    if !policy.enabled {
        return;
    }
    if runtime.hangup_in_flight.swap(true, Ordering::AcqRel) {
        return;
    }
    std::thread::spawn(move || {
        std::thread::sleep(policy.hangup_delay);
        let outcome = attempt_hangup(&runtime, &policy);
        runtime.hangup_in_flight.store(false, Ordering::Release);
        if let Some(event) = outcome {
            (events.on_call_hangup)(event);
        }
    });
}

fn attempt_hangup(runtime: &Arc<PortRuntime>, policy: &HangupPolicy) -> Option<CallHangup> {
    let mut guard = runtime.link.lock().unwrap_or_else(|err| err.into_inner());

    // 冷却窗口内只允许一次，锁内预占
    {
        let mut last = runtime
            .last_hangup_at
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        if let Some(at) = *last {
            if at.elapsed() < policy.cooldown {
                debug!(port = %runtime.port_name, "auto hangup suppressed by cooldown");
                return None;
            }
        }
        let caller = current_caller(runtime);
        if let Some(caller) = &caller {
            if policy.is_whitelisted(caller) {
                info!(port = %runtime.port_name, caller = %caller, "caller whitelisted, not hanging up");
                return None;
            }
        }
        *last = Some(Instant::now());
    }

    let caller = current_caller(runtime);
    let link = guard.as_mut()?;
    if let Err(err) = link.write_all(b"ATH\r") {
        warn!(port = %runtime.port_name, error = %err, "ATH write failed");
        return None;
    }
    std::thread::sleep(Duration::from_millis(150));
    // 兼容回退：部分模块只认 AT+CHUP
    if let Err(err) = link.write_all(b"AT+CHUP\r") {
        warn!(port = %runtime.port_name, error = %err, "AT+CHUP write failed");
    }
    drop(guard);

    let raw_line = build_raw_line(runtime);
    info!(port = %runtime.port_name, caller = caller.as_deref().unwrap_or("unknown"), "incoming call hung up");
    Some(CallHangup {
        com_port: runtime.port_name.clone(),
        caller_number: caller,
        hangup_time: Utc::now(),
        reason: HangupReason::AutoHangup,
        raw_line: Some(raw_line),
    })
}

/// 主叫缓存解析（TTL 内有效）。
fn current_caller(runtime: &Arc<PortRuntime>) -> Option<String> {
    let clip = runtime.last_clip.lock().unwrap_or_else(|err| err.into_inner());
    clip.as_ref()
        .filter(|cache| cache.cached_at.elapsed() < CLIP_CACHE_TTL)
        .map(|cache| cache.caller.clone())
}

fn build_raw_line(runtime: &Arc<PortRuntime>) -> String {
    let tail = runtime
        .last_tail
        .lock()
        .unwrap_or_else(|err| err.into_inner())
        .clone();
    let chunk = runtime
        .last_chunk
        .lock()
        .unwrap_or_else(|err| err.into_inner())
        .clone();
    format!("tail: {tail} | chunk: {chunk}")
}

fn store_truncated(slot: &Mutex<String>, text: &str) {
    let mut guard = slot.lock().unwrap_or_else(|err| err.into_inner());
    *guard = tail(text, RAW_LINE_LIMIT).to_string();
}

fn tail(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

fn release_link(runtime: &Arc<PortRuntime>) {
    let mut guard = runtime.link.lock().unwrap_or_else(|err| err.into_inner());
    if guard.take().is_some() {
        runtime.released.store(true, Ordering::Release);
    }
}

fn sleep_until_flag(runtime: &Arc<PortRuntime>, total: Duration, step: Duration) {
    let deadline = Instant::now() + total;
    while Instant::now() < deadline && !runtime.is_stopping() && !runtime.is_paused() {
        std::thread::sleep(step.min(Duration::from_millis(50)));
    }
}
