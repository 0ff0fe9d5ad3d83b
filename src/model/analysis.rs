//! 图片分析接口的响应模型

use serde::{Deserialize, Serialize};

/// 区域字幕（dense caption）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseCaption {
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl DenseCaption {
    pub fn new(text: impl Into<String>, confidence: Option<f64>) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// `/analyze-image` 的响应体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysisResponse {
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub dense_captions: Vec<DenseCaption>,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ImageAnalysisResponse {
    /// 仅携带错误信息的响应
    pub fn from_error(error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

/// `GET /` 的服务状态
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub message: &'static str,
    pub vision_endpoint_configured: bool,
    pub vision_key_configured: bool,
    pub storage_configured: bool,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_defaults_on_missing_fields() {
        let parsed: ImageAnalysisResponse = serde_json::from_str(r#"{"caption":"a dog"}"#).unwrap();
        assert_eq!(parsed.caption.as_deref(), Some("a dog"));
        assert!(parsed.dense_captions.is_empty());
        assert!(parsed.text_content.is_none());
        assert!(parsed.error.is_none());
    }

    #[test]
    fn test_dense_caption_confidence_optional() {
        let parsed: DenseCaption = serde_json::from_str(r#"{"text":"a cat"}"#).unwrap();
        assert_eq!(parsed, DenseCaption::new("a cat", None));
    }

    #[test]
    fn test_dense_caption_requires_text() {
        assert!(serde_json::from_str::<DenseCaption>(r#"{"confidence":0.4}"#).is_err());
    }

    #[test]
    fn test_error_response_shape() {
        let value = serde_json::to_value(ImageAnalysisResponse::from_error("boom")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "caption": null,
                "dense_captions": [],
                "text_content": null,
                "error": "boom"
            })
        );
    }
}
