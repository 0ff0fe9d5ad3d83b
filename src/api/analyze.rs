//! 图片分析接口
//! 接收上传图片，尽力保存原图，调用视觉服务并润色字幕

use crate::model::analysis::ImageAnalysisResponse;
use crate::storage::{blob_key_for, content_type_for, Storage};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

/// 上传表单中的文件字段名
const FILE_FIELD: &str = "file";

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("请求中缺少 file 字段")]
    MissingFile,
    #[error("上传内容无效: {0}")]
    InvalidInput(String),
    #[error("读取上传内容失败: {0}")]
    Multipart(#[from] MultipartError),
    #[error("视觉服务调用失败: {0:#}")]
    Vision(anyhow::Error),
}

impl AnalyzeError {
    /// 请求本身有问题时返回 400；上游失败沿用 200 + error 字段
    pub fn status_code(&self) -> StatusCode {
        match self {
            AnalyzeError::MissingFile
            | AnalyzeError::InvalidInput(_)
            | AnalyzeError::Multipart(_) => StatusCode::BAD_REQUEST,
            AnalyzeError::Vision(_) => StatusCode::OK,
        }
    }
}

impl IntoResponse for AnalyzeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ImageAnalysisResponse::from_error(self))).into_response()
    }
}

/// 上传的图片
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: Option<String>,
    pub data: Bytes,
}

/// `POST /analyze-image`
pub async fn analyze_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ImageAnalysisResponse>, AnalyzeError> {
    let upload = read_upload(multipart).await.map_err(|e| {
        warn!(event = "analyze.upload.rejected", error = %e);
        e
    })?;
    analyze_upload(&state, upload).await.map(Json)
}

/// 从表单中取出 `file` 字段
async fn read_upload(mut multipart: Multipart) -> Result<UploadedImage, AnalyzeError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let data = field.bytes().await?;
        if data.is_empty() {
            return Err(AnalyzeError::InvalidInput("上传文件为空".to_string()));
        }
        return Ok(UploadedImage { filename, data });
    }
    Err(AnalyzeError::MissingFile)
}

/// 保存原图、调用视觉服务并润色结果
pub async fn analyze_upload(
    state: &AppState,
    upload: UploadedImage,
) -> Result<ImageAnalysisResponse, AnalyzeError> {
    let start = Instant::now();
    info!(
        event = "analyze.start",
        filename = upload.filename.as_deref().unwrap_or("-"),
        size = upload.data.len()
    );

    if let Some(storage) = &state.storage {
        let key = blob_key_for(upload.filename.as_deref());
        store_image(storage.as_ref(), &key, &upload.data).await;
    }

    let analysis = state.vision.analyze(&upload.data).await.map_err(|e| {
        error!(event = "analyze.vision.failed", error = %format!("{e:#}"));
        AnalyzeError::Vision(e)
    })?;

    let enhanced = state.enhancer.enhance_response(&analysis.into_response());
    info!(
        event = "analyze.complete",
        dense_captions = enhanced.dense_captions.len(),
        has_text = enhanced.text_content.is_some(),
        elapsed_ms = start.elapsed().as_millis() as u64
    );
    Ok(enhanced)
}

/// 保存原图，失败只记录日志
async fn store_image(storage: &dyn Storage, key: &str, data: &[u8]) {
    match storage.put(key, data, content_type_for(key)).await {
        Ok(()) => match storage.get_public_url(key).await {
            Ok(url) => info!(
                target: "storage",
                event = "image.stored",
                backend = storage.backend(),
                url = %url
            ),
            Err(e) => warn!(target: "storage", event = "image.url_failed", error = %e),
        },
        Err(e) => error!(
            target: "storage",
            event = "image.store_failed",
            backend = storage.backend(),
            key,
            error = %format!("{e:#}")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::{CaptionEnhancer, FixedIntro};
    use crate::model::analysis::DenseCaption;
    use crate::storage::local::LocalStorage;
    use crate::util::config::Config;
    use crate::vision::{VisionAnalysis, VisionClient};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct StubVision {
        result: Option<VisionAnalysis>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VisionClient for StubVision {
        async fn analyze(&self, _image: &[u8]) -> Result<VisionAnalysis> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .clone()
                .ok_or_else(|| anyhow!("InvalidImageFormat: Input data is not a valid image."))
        }
    }

    struct BrokenStorage;

    #[async_trait]
    impl Storage for BrokenStorage {
        fn backend(&self) -> &'static str {
            "broken"
        }
        async fn put(&self, _key: &str, _data: &[u8], _ct: Option<&str>) -> Result<()> {
            Err(anyhow!("container unreachable"))
        }
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn exists(&self, _key: &str) -> Result<bool> {
            Ok(false)
        }
        async fn get_public_url(&self, key: &str) -> Result<String> {
            Ok(key.to_string())
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(false)
        }
    }

    fn sample_analysis() -> VisionAnalysis {
        VisionAnalysis {
            caption: Some("a dog a dog on a beach".to_string()),
            dense_captions: vec![
                DenseCaption::new("sand", Some(0.52)),
                DenseCaption::new("a dog", Some(0.77)),
                DenseCaption::new("a wave", Some(0.61)),
            ],
            read_lines: Some(vec!["BEACH".to_string(), "CLOSED".to_string()]),
        }
    }

    fn state_with(
        vision: Arc<StubVision>,
        storage: Option<Arc<dyn Storage>>,
    ) -> AppState {
        AppState {
            config: Arc::new(Config::default()),
            storage,
            vision,
            enhancer: Arc::new(CaptionEnhancer::new(FixedIntro(1))),
        }
    }

    fn upload(name: &str) -> UploadedImage {
        UploadedImage {
            filename: Some(name.to_string()),
            data: Bytes::from_static(b"\x89PNG\r\n\x1a\nfake"),
        }
    }

    #[tokio::test]
    async fn test_analyze_upload_stores_and_enhances() {
        let dir = TempDir::new().unwrap();
        let storage: Arc<dyn Storage> =
            Arc::new(LocalStorage::new(dir.path(), "http://localhost/files").unwrap());
        let vision = Arc::new(StubVision {
            result: Some(sample_analysis()),
            calls: AtomicUsize::new(0),
        });
        let state = state_with(vision.clone(), Some(storage.clone()));

        let response = analyze_upload(&state, upload("beach.png")).await.unwrap();

        assert_eq!(vision.calls.load(Ordering::SeqCst), 1);
        assert!(storage.exists("beach.png").await.unwrap());
        assert_eq!(
            response.caption.as_deref(),
            Some("The image shows a dog on a beach")
        );
        let texts: Vec<&str> = response
            .dense_captions
            .iter()
            .map(|c| c.text.as_str())
            .collect();
        assert_eq!(
            texts,
            vec!["The image shows a dog", "The image shows a wave", "sand"]
        );
        assert_eq!(response.text_content.as_deref(), Some("BEACH CLOSED"));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_does_not_block_analysis() {
        let vision = Arc::new(StubVision {
            result: Some(sample_analysis()),
            calls: AtomicUsize::new(0),
        });
        let state = state_with(vision, Some(Arc::new(BrokenStorage)));

        let response = analyze_upload(&state, upload("beach.png")).await.unwrap();
        assert!(response.caption.is_some());
    }

    #[tokio::test]
    async fn test_vision_failure_maps_to_error_body() {
        let vision = Arc::new(StubVision {
            result: None,
            calls: AtomicUsize::new(0),
        });
        let state = state_with(vision, None);

        let err = analyze_upload(&state, upload("x.png")).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::OK);
        let body = ImageAnalysisResponse::from_error(&err);
        assert!(body
            .error
            .as_deref()
            .unwrap()
            .contains("Input data is not a valid image."));
        assert!(body.caption.is_none());
    }

    #[test]
    fn test_request_errors_are_bad_request() {
        assert_eq!(AnalyzeError::MissingFile.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AnalyzeError::InvalidInput("empty".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AnalyzeError::MissingFile.to_string(), "请求中缺少 file 字段");
    }
}
