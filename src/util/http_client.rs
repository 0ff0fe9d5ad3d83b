//! HTTP客户端模块
//!
//! 为视觉服务调用提供可配置的 reqwest 客户端：超时、代理、连接池。

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

use crate::util::config::VisionConfig;

/// HTTP客户端配置
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 连接超时时间（秒）
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    /// TCP keepalive时间（秒）
    pub tcp_keepalive_secs: u64,
    /// 连接池空闲超时（秒）
    pub pool_idle_timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            connect_timeout_secs: 30,
            user_agent: format!("caption-server/{}", env!("CARGO_PKG_VERSION")),
            tcp_keepalive_secs: 60,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 10,
            http_proxy: None,
            https_proxy: None,
        }
    }
}

impl HttpClientConfig {
    /// 按视觉服务配置设置超时
    pub fn for_vision(vision: &VisionConfig) -> Self {
        Self {
            timeout_secs: vision.timeout_secs,
            connect_timeout_secs: vision.connect_timeout_secs,
            ..Self::default()
        }
    }

    /// 从环境变量加载代理配置
    pub fn with_env_proxy(mut self) -> Self {
        if let Ok(proxy_url) = std::env::var("HTTP_PROXY") {
            self.http_proxy = Some(proxy_url);
        }
        if let Ok(proxy_url) = std::env::var("HTTPS_PROXY") {
            self.https_proxy = Some(proxy_url);
        }
        self
    }
}

/// HTTP客户端包装器
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Self::build_reqwest_client(&config)?;
        Ok(Self { client, config })
    }

    fn build_reqwest_client(config: &HttpClientConfig) -> Result<Client> {
        let mut client_builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(&config.user_agent)
            .tcp_keepalive(Duration::from_secs(config.tcp_keepalive_secs))
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host);

        if let Some(proxy_url) = &config.http_proxy {
            match reqwest::Proxy::http(proxy_url) {
                Ok(proxy) => {
                    info!("使用HTTP代理: {}", proxy_url);
                    client_builder = client_builder.proxy(proxy);
                }
                Err(_) => warn!("HTTP代理配置无效: {}", proxy_url),
            }
        }

        if let Some(proxy_url) = &config.https_proxy {
            match reqwest::Proxy::https(proxy_url) {
                Ok(proxy) => {
                    info!("使用HTTPS代理: {}", proxy_url);
                    client_builder = client_builder.proxy(proxy);
                }
                Err(_) => warn!("HTTPS代理配置无效: {}", proxy_url),
            }
        }

        client_builder.build().context("构建HTTP客户端失败")
    }

    /// 底层reqwest客户端
    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.connect_timeout_secs, 30);
        assert!(config.user_agent.starts_with("caption-server/"));
    }

    #[test]
    fn test_vision_timeouts_applied() {
        let vision = VisionConfig {
            timeout_secs: 15,
            connect_timeout_secs: 5,
            ..Default::default()
        };
        let config = HttpClientConfig::for_vision(&vision);
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.pool_max_idle_per_host, 10);
    }

    #[test]
    fn test_client_creation() {
        let client = HttpClient::new(HttpClientConfig::default()).unwrap();
        assert_eq!(client.config().timeout_secs, 60);
    }
}
