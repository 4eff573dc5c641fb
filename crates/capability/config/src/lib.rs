//! 应用运行配置加载（服务端与 Agent 各一套）。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 服务端运行配置。
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: String,
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_access_ttl_seconds: u64,
    pub jwt_refresh_ttl_seconds: u64,
}

impl ServerConfig {
    /// 从环境变量读取服务端配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("SMSGW_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("SMSGW_DATABASE_URL".to_string()))?;
        let jwt_secret = env::var("SMSGW_JWT_SECRET")
            .map_err(|_| ConfigError::Missing("SMSGW_JWT_SECRET".to_string()))?;
        let jwt_access_ttl_seconds = read_u64_with_default("SMSGW_JWT_ACCESS_TTL_SECONDS", 3600)?;
        let jwt_refresh_ttl_seconds =
            read_u64_with_default("SMSGW_JWT_REFRESH_TTL_SECONDS", 7 * 24 * 3600)?;
        let http_addr =
            env::var("SMSGW_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let redis_url =
            env::var("SMSGW_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        Ok(Self {
            http_addr,
            database_url,
            redis_url,
            jwt_secret,
            jwt_access_ttl_seconds,
            jwt_refresh_ttl_seconds,
        })
    }
}

/// 来电自动挂断策略。
#[derive(Debug, Clone)]
pub struct HangupConfig {
    pub enabled: bool,
    pub hangup_delay_ms: u64,
    pub cooldown_ms: u64,
    /// 白名单为主叫号码子串，大小写不敏感。
    pub whitelist: Vec<String>,
}

impl Default for HangupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hangup_delay_ms: 200,
            cooldown_ms: 5000,
            whitelist: Vec::new(),
        }
    }
}

/// Agent 运行配置。
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub server_url: String,
    pub device_id: String,
    pub baud_rates: Vec<u32>,
    pub auto_start_on_scan: bool,
    pub hangup: HangupConfig,
}

impl AgentConfig {
    /// 从环境变量读取 Agent 配置。DeviceId 缺省取主机名。
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_url = env::var("SMSGW_SERVER_URL")
            .unwrap_or_else(|_| "ws://127.0.0.1:8080/hub/agent".to_string());
        let device_id = match read_optional("SMSGW_DEVICE_ID") {
            Some(value) => value,
            None => default_device_id(),
        };
        let baud_rates = read_baud_rates("SMSGW_BAUD_RATES")?;
        let auto_start_on_scan = read_bool_with_default("SMSGW_AUTO_START_ON_SCAN", true);
        let hangup = HangupConfig {
            enabled: read_bool_with_default("SMSGW_HANGUP_ENABLED", true),
            hangup_delay_ms: read_u64_with_default("SMSGW_HANGUP_DELAY_MS", 200)?,
            cooldown_ms: read_u64_with_default("SMSGW_HANGUP_COOLDOWN_MS", 5000)?,
            whitelist: read_csv("SMSGW_HANGUP_WHITELIST"),
        };

        Ok(Self {
            server_url,
            device_id,
            baud_rates,
            auto_start_on_scan,
            hangup,
        })
    }
}

/// 缺省 DeviceId：主机名环境变量，两个平台都取不到时用固定占位。
fn default_device_id() -> String {
    read_optional("HOSTNAME")
        .or_else(|| read_optional("COMPUTERNAME"))
        .unwrap_or_else(|| "smsgw-agent".to_string())
}

/// 探测波特率序列，顺序即尝试顺序。
fn read_baud_rates(key: &str) -> Result<Vec<u32>, ConfigError> {
    let raw = match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => return Ok(vec![115_200, 9600, 19_200, 38_400, 57_600]),
    };
    let mut rates = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let rate = part
            .parse::<u32>()
            .map_err(|_| ConfigError::Invalid(key.to_string(), part.to_string()))?;
        rates.push(rate);
    }
    if rates.is_empty() {
        return Err(ConfigError::Invalid(key.to_string(), raw));
    }
    Ok(rates)
}

/// 读取 u64 类型环境变量（带缺省值）。
fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_csv(key: &str) -> Vec<String> {
    match env::var(key) {
        Ok(value) => value
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
