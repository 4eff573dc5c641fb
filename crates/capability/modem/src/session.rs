//! 端口会话与仲裁
//!
//! 每个物理端口对应一个 [`PortRuntime`]：任一时刻至多一方（探测 /
//! 监听 / 发送事务 / 自动挂断写）接触端口，由 `link` 互斥锁保证——
//! 锁内持有的 `Option<Box<dyn SerialLink>>` 即该端口的 OS 句柄，
//! 暂停时取出丢弃（关闭句柄），恢复时由监听线程重开并重跑初始化。
//!
//! 发送方通过 [`PauseToken`] 暂停监听；令牌在 Drop 时恢复监听，
//! 错误路径上的恢复因此有保证。

use crate::io::SerialLink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// 来电主叫缓存（RING 可能先于 +CLIP 到达），TTL 2 分钟。
#[derive(Debug, Clone)]
pub struct ClipCache {
    pub caller: String,
    pub cached_at: Instant,
}

/// 每端口运行时状态。命令互斥锁即 `link`；无全局锁。
pub struct PortRuntime {
    pub port_name: String,
    pub baud_rate: u32,
    /// 监听器持有的串口句柄。None 表示已暂停或尚未打开。
    pub link: Mutex<Option<Box<dyn SerialLink>>>,
    /// 暂停标志：监听线程看到后在锁内丢弃句柄。
    pub paused: AtomicBool,
    /// 停止标志：监听线程退出。
    pub stop: AtomicBool,
    /// 句柄确已释放（发送方据此等待内核回收）。
    pub released: AtomicBool,
    /// 自动挂断冷却：上次挂断时刻。
    pub last_hangup_at: Mutex<Option<Instant>>,
    /// 主叫缓存。
    pub last_clip: Mutex<Option<ClipCache>>,
    /// 最后一个数据块（挂断事件 raw_line 用，截断保存）。
    pub last_chunk: Mutex<String>,
    /// 监听缓冲尾部（挂断事件 raw_line 用，截断保存）。
    pub last_tail: Mutex<String>,
    /// 挂断任务在途标志，避免同一阵 RING 连开多个任务。
    pub hangup_in_flight: AtomicBool,
}

impl PortRuntime {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            link: Mutex::new(None),
            paused: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            released: AtomicBool::new(true),
            last_hangup_at: Mutex::new(None),
            last_clip: Mutex::new(None),
            last_chunk: Mutex::new(String::new()),
            last_tail: Mutex::new(String::new()),
            hangup_in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// 暂停令牌。Drop 时恢复监听。
pub struct PauseToken {
    runtime: Arc<PortRuntime>,
    was_listening: bool,
}

impl PauseToken {
    /// 请求暂停。端口未在监听时返回 was_listening=false 的空令牌。
    pub fn acquire(runtime: Arc<PortRuntime>) -> PauseToken {
        let was_listening = !runtime.is_paused() && !runtime.is_stopping();
        if was_listening {
            runtime.paused.store(true, Ordering::Release);
        }
        PauseToken {
            runtime,
            was_listening,
        }
    }

    /// 是否真的暂停了一个在听的端口。
    pub fn paused_listener(&self) -> bool {
        self.was_listening
    }

    /// 监听器是否已释放句柄。
    pub fn listener_released(&self) -> bool {
        self.runtime.released.load(Ordering::Acquire)
    }
}

impl Drop for PauseToken {
    fn drop(&mut self) {
        if self.was_listening {
            self.runtime.paused.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_token_restores_on_drop() {
        let runtime = Arc::new(PortRuntime::new("COM3", 115_200));
        {
            let token = PauseToken::acquire(runtime.clone());
            assert!(token.paused_listener());
            assert!(runtime.is_paused());
        }
        assert!(!runtime.is_paused());
    }

    #[test]
    fn pause_token_is_noop_when_already_paused() {
        let runtime = Arc::new(PortRuntime::new("COM3", 115_200));
        runtime.paused.store(true, Ordering::Release);
        {
            let token = PauseToken::acquire(runtime.clone());
            assert!(!token.paused_listener());
        }
        // 外层的暂停不被内层令牌解除
        assert!(runtime.is_paused());
    }
}
