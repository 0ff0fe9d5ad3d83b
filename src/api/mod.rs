pub mod analyze;
pub mod meta;

use crate::util::config::{CorsConfig, StorageType};
use crate::util::middleware;
use crate::AppState;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

/// 请求级超时在视觉服务超时之上留出的余量（秒）
const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 30;

/// 整体请求超时（秒），超大配置值不会溢出
fn request_timeout_secs(vision_timeout_secs: u64) -> u64 {
    vision_timeout_secs.saturating_add(REQUEST_TIMEOUT_MARGIN_SECS)
}

/// 根据配置创建CORS层
///
/// 配置中出现 `*` 时允许任意源，此时不允许携带凭据。
pub fn create_cors_layer(cors: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if cors.allows_any_origin() {
        info!("CORS配置 - 允许任意源");
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|s| match s.trim().parse::<HeaderValue>() {
            Ok(origin) => Some(origin),
            Err(e) => {
                warn!("无效的CORS源: {} - {}", s, e);
                None
            }
        })
        .collect();

    info!("CORS配置 - 允许的源: {}", cors.allowed_origins.join(","));
    layer.allow_origin(origins).allow_credentials(true)
}

pub fn routes(app_state: AppState) -> Router {
    let config = app_state.config.clone();
    let request_timeout =
        Duration::from_secs(request_timeout_secs(config.vision.timeout_secs));

    let mut router = Router::new()
        .route("/", get(meta::service_status))
        .route("/analyze-image", post(analyze::analyze_image))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes()));

    // 本地存储时直接提供已保存的图片
    if config.storage.storage_type == StorageType::Local {
        info!("本地图片目录: {}", config.storage.local_dir);
        router = router.nest_service("/files", ServeDir::new(&config.storage.local_dir));
    }

    router
        .with_state(app_state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(from_fn(middleware::request_logging_middleware))
        .layer(create_cors_layer(&config.cors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::CaptionEnhancer;
    use crate::util::config::Config;
    use crate::vision::{VisionAnalysis, VisionClient};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use std::sync::Arc;
    use tower::util::ServiceExt;

    struct NoopVision;

    #[async_trait]
    impl VisionClient for NoopVision {
        async fn analyze(&self, _image: &[u8]) -> anyhow::Result<VisionAnalysis> {
            Ok(VisionAnalysis::default())
        }
    }

    fn app(cors: CorsConfig) -> Router {
        let mut config = Config::default();
        config.storage.storage_type = StorageType::Disabled;
        config.cors = cors;
        routes(AppState {
            config: Arc::new(config),
            storage: None,
            vision: Arc::new(NoopVision),
            enhancer: Arc::new(CaptionEnhancer::default()),
        })
    }

    async fn get_with_origin(app: Router, origin: &str) -> Response {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap();
        app.oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_cors_wildcard_allows_any_origin_without_credentials() {
        let cors = CorsConfig {
            allowed_origins: vec!["*".to_string()],
        };
        let response = get_with_origin(app(cors), "http://anywhere.example").await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .is_none());
    }

    #[tokio::test]
    async fn test_cors_origin_list_echoes_listed_origin_with_credentials() {
        let cors = CorsConfig {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "not a header\n".to_string(),
            ],
        };
        assert!(!cors.allows_any_origin());

        let response = get_with_origin(app(cors), "http://localhost:3000").await;
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn test_cors_origin_list_rejects_unlisted_origin() {
        let cors = CorsConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        };
        let response = get_with_origin(app(cors), "http://evil.example").await;
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[test]
    fn test_request_timeout_saturates() {
        assert_eq!(request_timeout_secs(60), 60 + REQUEST_TIMEOUT_MARGIN_SECS);
        assert_eq!(request_timeout_secs(u64::MAX), u64::MAX);
    }
}
