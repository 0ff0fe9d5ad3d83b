//! 配置结构定义模块
//! 包含系统配置的所有数据结构

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn get_port(&self) -> u16 {
        self.server.port
    }

    /// 服务对外的基础URL
    pub fn base_url(&self) -> String {
        let host = match self.server.host.as_str() {
            "0.0.0.0" | "::" | "" => "127.0.0.1",
            other => other,
        };
        format!("{}://{}:{}", self.server.protocol, host, self.server.port)
    }

    /// 上传大小上限（字节）
    pub fn max_upload_bytes(&self) -> usize {
        (self.server.max_upload_mb as usize).saturating_mul(1024 * 1024)
    }
}

/// HTTP服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// 单次上传的最大体积（MB）
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            protocol: default_protocol(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_max_upload_mb() -> u64 {
    20
}

/// 跨域配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// 允许的源，`*` 表示任意
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl CorsConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o.trim() == "*")
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

/// 视觉分析服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// 形如 `https://<resource>.cognitiveservices.azure.com`
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_vision_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// 字幕是否使用性别中立用词
    #[serde(default)]
    pub gender_neutral_caption: bool,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            key: String::new(),
            api_version: default_api_version(),
            timeout_secs: default_vision_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            gender_neutral_caption: false,
        }
    }
}

impl VisionConfig {
    pub fn endpoint_configured(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    pub fn key_configured(&self) -> bool {
        !self.key.trim().is_empty()
    }
}

fn default_api_version() -> String {
    "2023-10-01".to_string()
}

fn default_vision_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    30
}

/// 存储类型
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Azblob,
    Local,
    Disabled,
}

impl std::str::FromStr for StorageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "azblob" | "azure" => Ok(Self::Azblob),
            "local" => Ok(Self::Local),
            "disabled" | "none" | "off" => Ok(Self::Disabled),
            other => Err(format!("未知的存储类型: {other}")),
        }
    }
}

/// 图片存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(rename = "type", default)]
    pub storage_type: StorageType,
    /// Azure 存储连接串（AccountName=...;AccountKey=...）
    #[serde(default)]
    pub connection_string: String,
    #[serde(default = "default_container")]
    pub container: String,
    #[serde(default = "default_local_dir")]
    pub local_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            storage_type: StorageType::default(),
            connection_string: String::new(),
            container: default_container(),
            local_dir: default_local_dir(),
        }
    }
}

impl StorageSettings {
    pub fn is_configured(&self) -> bool {
        match self.storage_type {
            StorageType::Azblob => !self.connection_string.trim().is_empty(),
            StorageType::Local => !self.local_dir.trim().is_empty(),
            StorageType::Disabled => false,
        }
    }
}

fn default_container() -> String {
    "vision-images".to_string()
}

fn default_local_dir() -> String {
    "data/storage".to_string()
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub file: LogFileConfig,
    /// 是否输出JSON结构化日志
    #[serde(default)]
    pub structured: bool,
    /// 按目标覆盖日志级别，例如 `storage: debug`
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: LogFileConfig::default(),
            structured: false,
            overrides: HashMap::new(),
        }
    }
}

/// 日志文件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFileConfig {
    pub enabled: bool,
    pub directory: String,
    pub retention_days: Option<u32>,
}

impl Default for LogFileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: "logs".to_string(),
            retention_days: Some(7),
        }
    }
}
