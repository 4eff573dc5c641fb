//! 串口 I/O 抽象
//!
//! [`SerialLink`]/[`SerialOpener`] 是驱动与操作系统串口之间的接缝：
//! 生产实现基于 serialport crate（阻塞 I/O），测试用脚本化 Mock 替换。
//! 句柄的打开/关闭即 OS 句柄的获取/释放——监听器暂停时丢弃 Box 即关闭。

use crate::error::ModemError;
use serialport::{ClearBuffer, DataBits, Parity, StopBits};
use std::io::Read;
use std::time::Duration;

/// 打开参数。8-N-1 与 DTR/RTS 由实现固定。
#[derive(Debug, Clone)]
pub struct OpenSettings {
    pub baud_rate: u32,
    /// 监听期读超时（缺省 1.5 s）。
    pub read_timeout: Duration,
}

impl OpenSettings {
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            read_timeout: Duration::from_millis(1500),
        }
    }
}

/// 一条已打开的串口链路。
pub trait SerialLink: Send {
    /// 写入全部字节（ASCII 线协议，载荷按字节透传）。
    fn write_all(&mut self, data: &[u8]) -> Result<(), ModemError>;

    /// 取走当前已到达的全部字节；无数据时返回空。
    fn read_available(&mut self) -> Result<Vec<u8>, ModemError>;

    /// 丢弃输入输出缓冲。
    fn clear_buffers(&mut self) -> Result<(), ModemError>;
}

/// 串口枚举与打开。
pub trait SerialOpener: Send + Sync {
    /// 按操作系统枚举顺序列出端口名。
    fn list_ports(&self) -> Result<Vec<String>, ModemError>;

    /// 打开端口。失败即该端口的 Fatal 错误（调用方记为不可用并继续）。
    fn open(
        &self,
        port_name: &str,
        settings: &OpenSettings,
    ) -> Result<Box<dyn SerialLink>, ModemError>;
}

/// serialport crate 实现。
pub struct SystemSerial;

struct SystemLink {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialLink for SystemLink {
    fn write_all(&mut self, data: &[u8]) -> Result<(), ModemError> {
        use std::io::Write;
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>, ModemError> {
        let pending = self
            .port
            .bytes_to_read()
            .map_err(|err| ModemError::Serial(err.to_string()))?;
        if pending == 0 {
            return Ok(Vec::new());
        }
        let mut buffer = vec![0u8; pending as usize];
        match self.port.read(&mut buffer) {
            Ok(read) => {
                buffer.truncate(read);
                Ok(buffer)
            }
            Err(ref err) if err.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(err) => Err(ModemError::Serial(err.to_string())),
        }
    }

    fn clear_buffers(&mut self) -> Result<(), ModemError> {
        self.port
            .clear(ClearBuffer::All)
            .map_err(|err| ModemError::Serial(err.to_string()))
    }
}

impl SerialOpener for SystemSerial {
    fn list_ports(&self) -> Result<Vec<String>, ModemError> {
        let ports = serialport::available_ports()
            .map_err(|err| ModemError::Serial(err.to_string()))?;
        Ok(ports.into_iter().map(|port| port.port_name).collect())
    }

    fn open(
        &self,
        port_name: &str,
        settings: &OpenSettings,
    ) -> Result<Box<dyn SerialLink>, ModemError> {
        let mut port = serialport::new(port_name, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|err| ModemError::Open {
                port: port_name.to_string(),
                reason: err.to_string(),
            })?;
        // 部分模块依赖 DTR/RTS 才开始吐数据
        port.write_data_terminal_ready(true)
            .map_err(|err| ModemError::Serial(err.to_string()))?;
        port.write_request_to_send(true)
            .map_err(|err| ModemError::Serial(err.to_string()))?;
        Ok(Box::new(SystemLink { port }))
    }
}
