//! 存储系统初始化模块
//! 负责根据配置创建图片存储并检查其可用性

use crate::storage::{self, Storage};
use crate::util::config::Config;
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// 存储系统初始化器
pub struct StorageInitializer;

impl StorageInitializer {
    /// 根据配置创建存储实例，存储被禁用时返回 `None`
    pub async fn create_from_config(config: &Config) -> Result<Option<Arc<dyn Storage>>> {
        info!(
            target: "storage",
            event = "storage.init.start",
            storage_type = ?config.storage.storage_type
        );
        let storage = storage::factory::create_storage(&config.storage, &config.base_url())?;

        if let Some(storage) = &storage {
            if let Err(e) = storage.prepare().await {
                warn!(
                    target: "storage",
                    event = "storage.prepare.failed",
                    backend = storage.backend(),
                    error = %format!("{e:#}")
                );
            }
            let health = Self::health_check(storage.as_ref()).await;
            if health.is_healthy {
                info!(
                    target: "storage",
                    event = "storage.init.success",
                    backend = storage.backend(),
                    response_time_ms = health.response_time_ms
                );
            } else {
                // 上传只是尽力而为，存储不可用时服务照常启动
                warn!(
                    target: "storage",
                    event = "storage.init.degraded",
                    backend = storage.backend(),
                    error = health.error_message.as_deref().unwrap_or("-")
                );
            }
        }

        Ok(storage)
    }

    /// 执行存储系统健康检查
    pub async fn health_check(storage: &dyn Storage) -> StorageHealth {
        let start_time = Instant::now();
        let result = storage.health_check().await;
        let response_time_ms = start_time.elapsed().as_millis() as u64;

        match result {
            Ok(true) => StorageHealth::healthy(storage.backend(), response_time_ms),
            Ok(false) => StorageHealth::unhealthy(storage.backend(), "存储不可访问".to_string()),
            Err(e) => {
                error!(
                    target: "storage",
                    event = "storage.health.failed",
                    backend = storage.backend(),
                    error = %format!("{e:#}")
                );
                StorageHealth::unhealthy(storage.backend(), format!("{e:#}"))
            }
        }
    }
}

/// 存储系统健康状态
#[derive(Debug, Clone)]
pub struct StorageHealth {
    pub backend: &'static str,
    pub is_healthy: bool,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
    pub error_message: Option<String>,
    pub last_check: chrono::DateTime<chrono::Utc>,
}

impl StorageHealth {
    pub fn healthy(backend: &'static str, response_time_ms: u64) -> Self {
        Self {
            backend,
            is_healthy: true,
            response_time_ms,
            error_message: None,
            last_check: chrono::Utc::now(),
        }
    }

    pub fn unhealthy(backend: &'static str, error: String) -> Self {
        Self {
            backend,
            is_healthy: false,
            response_time_ms: 0,
            error_message: Some(error),
            last_check: chrono::Utc::now(),
        }
    }
}
