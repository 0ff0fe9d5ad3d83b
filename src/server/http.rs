//! HTTP服务器设置模块
//! 负责绑定监听地址、挂载路由并处理优雅关闭

use crate::api::routes;
use crate::util::config::Config;
use crate::AppState;
use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::{info, warn};

/// HTTP服务器管理器
pub struct ServerManager;

impl ServerManager {
    /// 创建HTTP服务器
    pub async fn create_server(config: &Config, app_state: AppState) -> Result<HttpServer> {
        info!(
            target: "server.http",
            event = "http.server.create",
            "创建HTTP服务器"
        );

        let listener = Self::bind_listener(&config.server.host, config.get_port()).await?;
        let local_addr = listener.local_addr()?;

        info!(target: "server.http", event = "http.router.build");
        let app_routes = routes(app_state);

        info!(
            target: "server.http",
            event = "http.server.ready",
            address = %local_addr
        );

        Ok(HttpServer {
            listener,
            app_routes,
            local_addr,
        })
    }

    /// 绑定监听地址
    pub async fn bind_listener(host: &str, port: u16) -> Result<TcpListener> {
        let host = match host.trim() {
            "" => "0.0.0.0",
            other => other,
        };
        // IPv6 地址需要方括号
        let address = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };

        info!(
            target: "server.http",
            event = "http.server.bind_start",
            address = %address
        );
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("监听地址 {} 绑定失败", address))?;
        info!(
            target: "server.http",
            event = "http.server.bound",
            address = %address
        );
        Ok(listener)
    }

    /// 启动服务器，阻塞直到收到关闭信号
    pub async fn start_server(server: HttpServer) -> Result<()> {
        info!(
            target: "server.http",
            event = "http.server.start",
            address = %server.local_addr
        );

        axum::serve(server.listener, server.app_routes)
            .with_graceful_shutdown(Self::shutdown_signal())
            .await?;

        info!(target: "server.http", event = "http.server.stopped", "HTTP服务器已关闭");
        Ok(())
    }

    async fn shutdown_signal() {
        info!(target: "server.http", event = "http.server.shutdown_wait");

        tokio::select! {
            _ = ctrl_c() => {
                info!(
                    target: "server.http",
                    event = "http.server.signal",
                    signal = "SIGINT"
                );
            }
            _ = Self::wait_for_unix_signal("SIGTERM") => {
                info!(
                    target: "server.http",
                    event = "http.server.signal",
                    signal = "SIGTERM"
                );
            }
            _ = Self::wait_for_unix_signal("SIGHUP") => {
                warn!(
                    target: "server.http",
                    event = "http.server.signal",
                    signal = "SIGHUP",
                    "暂不支持配置重载，准备退出"
                );
            }
        }

        info!(target: "server.http", event = "http.server.shutdown_begin");
    }

    /// 等待 SIGTERM / SIGHUP；注册失败或非 Unix 平台时永远等待
    async fn wait_for_unix_signal(name: &'static str) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let kind = match name {
                "SIGHUP" => SignalKind::hangup(),
                _ => SignalKind::terminate(),
            };
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!("注册{}监听失败: {}", name, e);
                    std::future::pending::<()>().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = name;
            std::future::pending::<()>().await;
        }
    }
}

/// HTTP服务器实例
pub struct HttpServer {
    listener: TcpListener,
    app_routes: Router,
    local_addr: SocketAddr,
}

impl HttpServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
