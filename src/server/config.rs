//! 配置管理模块
//! 负责配置文件的查找、加载、验证以及日志系统初始化

use crate::util::config::{Config, ConfigLoader, ConfigValidator, ValidationReport};
use crate::util::log::{cleanup_old_logs, log_init_with_config, LogGuard};
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 日志文件名前缀
pub const LOG_FILE_PREFIX: &str = "caption-server";

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 加载和验证配置
    ///
    /// 配置文件不存在时写出模板并使用默认值；缺少必需的环境变量时返回错误，
    /// 错误信息列出全部缺失项。
    pub fn load_and_validate() -> Result<(Config, ValidationReport)> {
        let config_path = Self::find_config_file_path("config.yaml");
        let config = Self::load_from_path(&config_path)?;
        let report = ConfigValidator::validate_all(&config);

        if let Some(message) = report.missing_env_message() {
            return Err(anyhow!(message));
        }
        if report.has_errors() {
            let details: Vec<String> = report
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            return Err(anyhow!(
                "配置验证失败: {} 个错误\n{}",
                report.error_count(),
                details.join("\n")
            ));
        }

        Ok((config, report))
    }

    /// 从指定路径加载配置，文件不存在时生成模板
    pub fn load_from_path(config_path: &Path) -> Result<Config> {
        if config_path.exists() {
            return ConfigLoader::load_with_env_overrides(config_path);
        }

        let template = Config::default();
        match template.write_yaml_to_path(config_path) {
            Ok(()) => eprintln!("[note] 已生成默认配置文件: {}", config_path.display()),
            Err(e) => eprintln!("[warn] 生成默认配置文件失败: {e:#}"),
        }
        Ok(ConfigLoader::apply_env_overrides(template))
    }

    /// 初始化日志系统，并按保留天数清理旧日志
    pub fn initialize_logging(config: &Config) -> Result<LogGuard> {
        let guard = log_init_with_config(LOG_FILE_PREFIX, &config.logging)?;

        if let (Some(retention_days), Some(log_dir)) =
            (config.logging.file.retention_days, guard.directory.as_deref())
        {
            match cleanup_old_logs(log_dir, LOG_FILE_PREFIX, retention_days) {
                Ok(deleted) => info!(
                    event = "log.cleanup",
                    retention_days,
                    deleted
                ),
                Err(e) => warn!("日志清理失败: {}", e),
            }
        }

        Ok(guard)
    }

    /// 记录验证报告中的警告与提示
    pub fn log_validation_report(report: &ValidationReport) {
        for warning in &report.warnings {
            warn!(
                event = "config.validation.warning",
                field = %warning.field,
                message = %warning.message
            );
        }
        for item in &report.info {
            info!(
                event = "config.validation.info",
                field = %item.field,
                message = %item.message
            );
        }
    }

    /// 查找配置文件路径，适应开发和部署两种目录结构
    pub fn find_config_file_path(filename: &str) -> PathBuf {
        let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|path| path.parent().map(Path::to_path_buf));
        Self::search_config_path(filename, &current_dir, exe_dir.as_deref())
    }

    fn search_config_path(filename: &str, current_dir: &Path, exe_dir: Option<&Path>) -> PathBuf {
        let mut candidates = vec![current_dir.join("config").join(filename)];
        if let Some(parent) = current_dir.parent() {
            candidates.push(parent.join("config").join(filename));
        }
        // 可执行文件位于 bin/ 时检查项目根目录
        if let Some(exe_dir) = exe_dir {
            if exe_dir.file_name() == Some(std::ffi::OsStr::new("bin")) {
                if let Some(project_root) = exe_dir.parent() {
                    candidates.push(project_root.join("config").join(filename));
                }
            }
        }
        candidates.push(current_dir.join(filename));

        if let Some(found) = candidates.into_iter().find(|p| p.exists()) {
            return found;
        }

        // 都不存在：在 bin/ 下运行时落到上级 config/，否则当前目录
        match current_dir.parent() {
            Some(parent) if current_dir.file_name() == Some(std::ffi::OsStr::new("bin")) => {
                parent.join("config").join(filename)
            }
            _ => current_dir.join(filename),
        }
    }
}
