//! 串口 GSM 调制解调器驱动
//!
//! 四个协作部件共享同一条物理端口：
//! - [`scanner::ComPortScanner`]：波特率级联探测与详情查询
//! - [`receiver::SmsReceiver`]：URC 流监听（+CMT / +CMTI / 来电自动挂断）
//! - [`sender::SmsSender`]：`AT+CMGS` 发送事务（暂停监听、独占句柄）
//! - [`session::PortRuntime`]：端口仲裁（命令互斥锁与暂停令牌）
//!
//! I/O 为阻塞式（serialport），监听各占一条线程；上层（Agent）经
//! 通道与 spawn_blocking 桥接到异步世界。

pub mod at;
mod error;
pub mod io;
pub mod receiver;
pub mod scanner;
pub mod sender;
pub mod session;
mod types;
pub mod ucs2;
pub mod urc;

pub use error::ModemError;
pub use io::{OpenSettings, SerialLink, SerialOpener, SystemSerial};
pub use receiver::{ReceiverConfig, ReceiverEvents, SmsReceiver};
pub use scanner::{ComPortScanner, ScannerConfig};
pub use sender::{SenderConfig, SmsSender};
pub use types::{
    CallHangup, HangupPolicy, HangupReason, ListenPort, ModemInfo, PortInfo, ScanResult,
    SendReport, SmsReceived,
};
