//! 服务器模块
//!
//! - 配置管理 (config.rs)
//! - 存储系统初始化 (storage.rs)
//! - HTTP服务器设置 (http.rs)
//!
//! ```ignore
//! let server = ServerBootstrap::new().await?;
//! server.start().await?;
//! ```

pub mod config;
pub mod http;
pub mod storage;

pub use config::ConfigManager;
pub use http::{HttpServer, ServerManager};
pub use storage::{StorageHealth, StorageInitializer};

use crate::build_info;
use crate::caption::CaptionEnhancer;
use crate::util::config::{Config, ValidationReport};
use crate::util::http_client::{HttpClient, HttpClientConfig};
use crate::util::log::LogGuard;
use crate::vision::{AzureVisionClient, VisionClient};
use crate::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// 服务器引导程序 - 统一的服务器启动入口
pub struct ServerBootstrap {
    config: Config,
    validation_report: ValidationReport,
    _log_guard: LogGuard,
}

impl ServerBootstrap {
    /// 加载配置并初始化日志
    pub async fn new() -> Result<Self> {
        let (config, validation_report) = ConfigManager::load_and_validate()?;
        let log_guard = ConfigManager::initialize_logging(&config)?;
        ConfigManager::log_validation_report(&validation_report);

        info!(event = "bootstrap.ready", version = %build_info::summary());

        Ok(Self {
            config,
            validation_report,
            _log_guard: log_guard,
        })
    }

    /// 启动服务器，阻塞直到关闭
    pub async fn start(self) -> Result<()> {
        info!("=== 图像字幕服务启动 ===");
        info!("版本信息: {}", build_info::summary());
        info!("服务地址: {}", self.config.base_url());

        let app_state = self.create_app_state().await?;
        let server = ServerManager::create_server(&self.config, app_state).await?;
        ServerManager::start_server(server).await
    }

    /// 创建应用状态
    pub async fn create_app_state(&self) -> Result<AppState> {
        build_app_state(&self.config).await
    }

    /// 执行健康检查
    pub async fn health_check(&self) -> Result<SystemHealthReport> {
        info!(event = "health.check.start");

        let storage_health = match StorageInitializer::create_from_config(&self.config).await? {
            Some(storage) => Some(StorageInitializer::health_check(storage.as_ref()).await),
            None => None,
        };
        let storage_ok = storage_health.as_ref().map_or(true, |h| h.is_healthy);

        Ok(SystemHealthReport {
            overall_healthy: storage_ok && self.validation_report.is_valid(),
            vision_configured: self.config.vision.endpoint_configured()
                && self.config.vision.key_configured(),
            storage_health,
            validation_warnings: self
                .validation_report
                .warnings
                .iter()
                .map(|w| format!("{}: {}", w.field, w.message))
                .collect(),
            check_time: chrono::Utc::now(),
        })
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }

    pub fn get_validation_report(&self) -> &ValidationReport {
        &self.validation_report
    }
}

/// 按配置组装存储、视觉客户端和字幕增强器
pub async fn build_app_state(config: &Config) -> Result<AppState> {
    info!(event = "app_state.build.start");

    let storage = StorageInitializer::create_from_config(config).await?;

    let http = HttpClient::new(HttpClientConfig::for_vision(&config.vision).with_env_proxy())
        .context("初始化HTTP客户端失败")?;
    let vision: Arc<dyn VisionClient> = Arc::new(
        AzureVisionClient::new(&config.vision, http).context("初始化视觉服务客户端失败")?,
    );

    info!(
        event = "app_state.build.complete",
        storage = storage.as_ref().map_or("disabled", |s| s.backend())
    );

    Ok(AppState {
        config: Arc::new(config.clone()),
        storage,
        vision,
        enhancer: Arc::new(CaptionEnhancer::default()),
    })
}

/// 系统健康检查报告
#[derive(Debug, Clone)]
pub struct SystemHealthReport {
    pub overall_healthy: bool,
    pub vision_configured: bool,
    /// 存储被禁用时为 `None`
    pub storage_health: Option<StorageHealth>,
    pub validation_warnings: Vec<String>,
    pub check_time: chrono::DateTime<chrono::Utc>,
}

/// 便捷函数：启动服务器
pub async fn start_server() -> Result<()> {
    let bootstrap = ServerBootstrap::new().await?;
    bootstrap.start().await
}

/// 便捷函数：执行健康检查
pub async fn check_system_health() -> Result<SystemHealthReport> {
    let bootstrap = ServerBootstrap::new().await?;
    bootstrap.health_check().await
}
