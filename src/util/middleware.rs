use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use std::time::Instant;
use uuid::Uuid;

fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
}

fn extract_user_agent(headers: &HeaderMap) -> &str {
    headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

fn parse_content_length(headers: &HeaderMap) -> usize {
    headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0)
}

fn is_quiet_path(path: &str) -> bool {
    matches!(path, "/favicon.ico")
}

// 统一请求日志中间件，写入 http.server 目标（访问日志文件）
pub async fn request_logging_middleware(mut request: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = request.headers();
    let user_agent = extract_user_agent(headers).to_string();
    let client_ip = extract_client_ip(headers).unwrap_or_else(|| "-".to_string());
    let request_size = parse_content_length(headers);
    request.extensions_mut().insert(request_id.clone());

    let response = next.run(request).await;

    if !is_quiet_path(uri.path()) {
        let status = response.status();
        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        if status.is_server_error() {
            tracing::warn!(
                target: "http.server",
                event = "http.request",
                request_id = %request_id,
                method = %method,
                path = %uri.path(),
                status = status.as_u16(),
                elapsed_ms,
                request_size,
                client_ip = %client_ip,
                user_agent = %user_agent
            );
        } else {
            tracing::info!(
                target: "http.server",
                event = "http.request",
                request_id = %request_id,
                method = %method,
                path = %uri.path(),
                status = status.as_u16(),
                elapsed_ms,
                request_size,
                client_ip = %client_ip,
                user_agent = %user_agent
            );
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_header_defaults() {
        let headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers), None);
        assert_eq!(extract_user_agent(&headers), "unknown");
        assert_eq!(parse_content_length(&headers), 0);
    }
}
