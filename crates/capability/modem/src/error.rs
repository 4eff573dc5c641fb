//! 串口驱动错误类型。

/// 串口/AT 层错误。
#[derive(Debug, thiserror::Error)]
pub enum ModemError {
    #[error("open {port} failed: {reason}")]
    Open { port: String, reason: String },
    #[error("serial io: {0}")]
    Serial(String),
    #[error("timeout waiting for response to {0}")]
    Timeout(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("port {0} is not listening")]
    NotListening(String),
}

impl From<std::io::Error> for ModemError {
    fn from(err: std::io::Error) -> Self {
        ModemError::Serial(err.to_string())
    }
}
