//! 配置加载和管理模块
//! 处理配置文件的读取、写入、环境变量覆盖和默认值生成

use super::types::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从YAML文件读取配置
    pub fn read_yaml(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        Self::parse_yaml(&config_str)
    }

    /// 解析YAML文本
    pub fn parse_yaml(content: &str) -> Result<Config> {
        serde_yaml::from_str(content).context("配置文件YAML解析失败")
    }

    /// 应用进程环境变量覆盖
    pub fn apply_env_overrides(config: Config) -> Config {
        Self::apply_overrides_from(config, |key| std::env::var(key).ok())
    }

    /// 应用环境变量覆盖，`lookup` 用于读取变量
    ///
    /// 敏感字段（密钥、连接串）只记录是否覆盖，不打印明文。
    pub fn apply_overrides_from<F>(mut config: Config, lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        tracing::info!("[tool] 应用环境变量配置覆盖...");

        if let Some(endpoint) = lookup("VISION_ENDPOINT") {
            config.vision.endpoint = endpoint.trim().to_string();
            tracing::info!("[ok] 环境变量覆盖视觉服务地址: {}", config.vision.endpoint);
        }

        if let Some(key) = lookup("VISION_KEY") {
            config.vision.key = key.trim().to_string();
            tracing::info!("[ok] 环境变量覆盖视觉服务密钥: [安全隐藏]");
        }

        if let Some(conn) = lookup("AZURE_STORAGE_CONNECTION_STRING") {
            config.storage.connection_string = conn.trim().to_string();
            tracing::info!("[ok] 环境变量覆盖存储连接串: [安全隐藏]");
        }

        if let Some(storage_type) = lookup("CAPTION_STORAGE_TYPE") {
            match storage_type.parse::<StorageType>() {
                Ok(parsed) => {
                    config.storage.storage_type = parsed;
                    tracing::info!("[ok] 环境变量覆盖存储类型: {:?}", parsed);
                }
                Err(e) => tracing::warn!("[warn] CAPTION_STORAGE_TYPE 无效: {}", e),
            }
        }

        if let Some(container) = lookup("CAPTION_STORAGE_CONTAINER") {
            config.storage.container = container.trim().to_string();
            tracing::info!("[ok] 环境变量覆盖存储容器: {}", config.storage.container);
        }

        if let Some(host) = lookup("CAPTION_HOST") {
            config.server.host = host.trim().to_string();
            tracing::info!("[ok] 环境变量覆盖服务器地址: {}", config.server.host);
        }

        if let Some(port_str) = lookup("CAPTION_PORT") {
            match port_str.trim().parse::<u16>() {
                Ok(port) => {
                    config.server.port = port;
                    tracing::info!("[ok] 环境变量覆盖服务器端口: {}", port);
                }
                Err(_) => tracing::warn!("[warn] CAPTION_PORT 无法解析为端口: {}", port_str),
            }
        }

        if let Some(level) = lookup("CAPTION_LOG_LEVEL") {
            config.logging.level = level.trim().to_ascii_lowercase();
            tracing::info!("[ok] 环境变量覆盖日志级别: {}", config.logging.level);
        }

        if let Some(flag) = lookup("CAPTION_LOG_STRUCTURED") {
            match Self::parse_bool(&flag) {
                Ok(enabled) => {
                    config.logging.structured = enabled;
                    tracing::info!("[ok] 环境变量覆盖结构化日志: {}", enabled);
                }
                Err(()) => {
                    tracing::warn!("[warn] CAPTION_LOG_STRUCTURED 无法解析为布尔值: {}", flag)
                }
            }
        }

        if let Some(origins) = lookup("CORS_ALLOWED_ORIGINS") {
            let parsed: Vec<String> = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if parsed.is_empty() {
                tracing::warn!("[warn] CORS_ALLOWED_ORIGINS 为空，保持配置文件设置");
            } else {
                tracing::info!("[ok] 环境变量覆盖CORS源: {}", parsed.join(","));
                config.cors.allowed_origins = parsed;
            }
        }

        config
    }

    /// 解析布尔环境变量
    fn parse_bool(value: &str) -> Result<bool, ()> {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Ok(true),
            "false" | "0" | "no" | "n" => Ok(false),
            _ => Err(()),
        }
    }

    /// 配置加载（配置文件 + 环境变量）
    pub fn load_with_env_overrides(path: impl AsRef<Path>) -> Result<Config> {
        let base_config = Self::read_yaml(path)?;
        let config = Self::apply_env_overrides(base_config);
        tracing::info!("[ok] 配置加载完成");
        Ok(config)
    }
}

/// 配置写入器
pub struct ConfigWriter;

impl ConfigWriter {
    /// 写入YAML文件
    pub fn write_yaml(config: &Config, path: impl AsRef<Path>) -> Result<()> {
        let yaml = serde_yaml::to_string(config).context("配置序列化失败")?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("写入配置文件失败: {}", path.as_ref().display()))?;
        Ok(())
    }

    /// 写入YAML文件，必要时创建父目录
    pub fn write_yaml_with_dir(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("创建配置目录失败: {}", parent.display()))?;
            }
        }
        Self::write_yaml(config, path)
    }

    /// 生成配置模板（密钥留空，由环境变量提供）
    pub fn generate_template() -> Config {
        Config::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_minimal_yaml_uses_defaults() {
        let config = ConfigLoader::parse_yaml("server:\n  host: 127.0.0.1\n  port: 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.protocol, "http");
        assert_eq!(config.server.max_upload_mb, 20);
        assert_eq!(config.storage.container, "vision-images");
        assert_eq!(config.storage.storage_type, StorageType::Azblob);
        assert_eq!(config.vision.api_version, "2023-10-01");
        assert!(config.cors.allows_any_origin());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_storage_type() {
        let config = ConfigLoader::parse_yaml("storage:\n  type: local\n  local_dir: /tmp/x\n").unwrap();
        assert_eq!(config.storage.storage_type, StorageType::Local);
        assert_eq!(config.storage.local_dir, "/tmp/x");
    }

    #[test]
    fn test_env_overrides() {
        let lookup = lookup_from(&[
            ("VISION_ENDPOINT", " https://demo.cognitiveservices.azure.com "),
            ("VISION_KEY", "secret"),
            ("AZURE_STORAGE_CONNECTION_STRING", "AccountName=a;AccountKey=b"),
            ("CAPTION_PORT", "9100"),
            ("CAPTION_STORAGE_TYPE", "LOCAL"),
            ("CAPTION_LOG_STRUCTURED", "yes"),
            ("CORS_ALLOWED_ORIGINS", "http://a.test, http://b.test,"),
        ]);

        let config = ConfigLoader::apply_overrides_from(Config::default(), lookup);
        assert_eq!(config.vision.endpoint, "https://demo.cognitiveservices.azure.com");
        assert_eq!(config.vision.key, "secret");
        assert_eq!(config.storage.connection_string, "AccountName=a;AccountKey=b");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.storage.storage_type, StorageType::Local);
        assert!(config.logging.structured);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let lookup = lookup_from(&[
            ("CAPTION_PORT", "not-a-port"),
            ("CAPTION_STORAGE_TYPE", "floppy"),
            ("CAPTION_LOG_STRUCTURED", "maybe"),
            ("CORS_ALLOWED_ORIGINS", " , "),
        ]);
        let config = ConfigLoader::apply_overrides_from(Config::default(), lookup);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.storage_type, StorageType::Azblob);
        assert!(!config.logging.structured);
        assert!(config.cors.allows_any_origin());
    }

    #[test]
    fn test_template_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config").join("config.yaml");

        ConfigWriter::write_yaml_with_dir(&ConfigWriter::generate_template(), &path).unwrap();
        let loaded = ConfigLoader::read_yaml(&path).unwrap();
        assert_eq!(loaded.server.port, 8000);
        assert!(loaded.vision.endpoint.is_empty());
        assert_eq!(loaded.logging.file.retention_days, Some(7));
    }

    #[test]
    fn test_read_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(ConfigLoader::read_yaml(dir.path().join("absent.yaml")).is_err());
    }
}
