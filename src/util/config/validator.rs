//! 配置验证模块
//! 提供配置的验证、检查和诊断功能

use super::types::*;
use crate::storage::azblob::ConnectionString;
use url::Url;

/// 配置验证器
pub struct ConfigValidator;

impl ConfigValidator {
    /// 全面验证配置
    pub fn validate_all(config: &Config) -> ValidationReport {
        let mut report = ValidationReport::new();

        Self::validate_server_config(&config.server, &mut report);
        Self::validate_vision_config(&config.vision, &mut report);
        Self::validate_storage_config(&config.storage, &mut report);
        Self::validate_cors_config(&config.cors, &mut report);
        Self::validate_logging_config(&config.logging, &mut report);

        report
    }

    /// 验证服务器配置
    fn validate_server_config(server: &ServerConfig, report: &mut ValidationReport) {
        if server.port == 0 {
            report.add_error("server.port", "端口不能为0");
        } else if server.port < 1024 {
            report.add_warning("server.port", "使用了特权端口，可能需要管理员权限");
        }

        if server.protocol != "http" && server.protocol != "https" {
            report.add_error(
                "server.protocol",
                &format!("无效的协议: {}", server.protocol),
            );
        }

        if server.max_upload_mb == 0 {
            report.add_error("server.max_upload_mb", "上传大小上限必须大于0");
        }
    }

    /// 验证视觉服务配置
    fn validate_vision_config(vision: &VisionConfig, report: &mut ValidationReport) {
        if !vision.endpoint_configured() {
            report.add_missing_env("VISION_ENDPOINT");
        } else if let Err(e) = Url::parse(&vision.endpoint) {
            report.add_error(
                "vision.endpoint",
                &format!("无效的视觉服务地址 {}: {}", vision.endpoint, e),
            );
        }

        if !vision.key_configured() {
            report.add_missing_env("VISION_KEY");
        }

        if vision.timeout_secs == 0 {
            report.add_error("vision.timeout_secs", "请求超时必须大于0");
        }
    }

    /// 验证存储配置
    fn validate_storage_config(storage: &StorageSettings, report: &mut ValidationReport) {
        match storage.storage_type {
            StorageType::Azblob => {
                if storage.connection_string.trim().is_empty() {
                    report.add_missing_env("AZURE_STORAGE_CONNECTION_STRING");
                } else if let Err(e) = ConnectionString::parse(&storage.connection_string) {
                    report.add_error("storage.connection_string", &e.to_string());
                }
                if storage.container.trim().is_empty() {
                    report.add_error("storage.container", "存储容器名不能为空");
                }
            }
            StorageType::Local => {
                if storage.local_dir.trim().is_empty() {
                    report.add_error("storage.local_dir", "本地存储目录不能为空");
                }
            }
            StorageType::Disabled => {
                report.add_info("storage.type", "图片存储已禁用，上传的图片不会被保存");
            }
        }
    }

    /// 验证跨域配置
    fn validate_cors_config(cors: &CorsConfig, report: &mut ValidationReport) {
        if cors.allowed_origins.is_empty() {
            report.add_warning("cors.allowed_origins", "未配置允许的源，浏览器跨域请求将被拒绝");
        }
        for origin in cors.allowed_origins.iter().filter(|o| o.trim() != "*") {
            if Url::parse(origin.trim()).is_err() {
                report.add_warning("cors.allowed_origins", &format!("无效的CORS源: {origin}"));
            }
        }
    }

    /// 验证日志配置
    fn validate_logging_config(logging: &LoggingConfig, report: &mut ValidationReport) {
        let valid_levels = ["trace", "debug", "info", "warn", "warning", "error"];
        if !valid_levels.contains(&logging.level.to_lowercase().as_str()) {
            report.add_warning(
                "logging.level",
                &format!("无效的日志级别 {}，将使用 info", logging.level),
            );
        }

        if logging.file.enabled && logging.file.directory.trim().is_empty() {
            report.add_error("logging.file.directory", "启用文件日志时目录不能为空");
        }
    }
}

/// 验证报告
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub info: Vec<ValidationIssue>,
    /// 缺失的必需环境变量
    pub missing_env: Vec<&'static str>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_info(&mut self, field: &str, message: &str) {
        self.info.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    fn add_missing_env(&mut self, name: &'static str) {
        self.missing_env.push(name);
        self.add_error(name, "必需的配置缺失");
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    /// 列出所有缺失环境变量的提示信息
    pub fn missing_env_message(&self) -> Option<String> {
        if self.missing_env.is_empty() {
            return None;
        }
        let mut message = String::from("Missing environment variables:\n");
        for name in &self.missing_env {
            message.push_str("- ");
            message.push_str(name);
            message.push('\n');
        }
        Some(message)
    }
}

/// 验证问题
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}
