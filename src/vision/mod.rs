//! 视觉分析服务客户端
//!
//! 负责把图片字节交给外部图像分析服务，取回主字幕、区域字幕和OCR文本行。
//! 字幕的清洗与润色不在这里做，见 `caption` 模块。

pub mod azure;

pub use azure::AzureVisionClient;

use crate::model::analysis::{DenseCaption, ImageAnalysisResponse};
use anyhow::Result;
use async_trait::async_trait;

/// 视觉服务返回的原始分析结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisionAnalysis {
    pub caption: Option<String>,
    pub dense_captions: Vec<DenseCaption>,
    /// OCR 文本行；服务未返回读取结果时为 `None`
    pub read_lines: Option<Vec<String>>,
}

impl VisionAnalysis {
    /// 转为接口响应（未增强），OCR 行以单个空格拼接
    pub fn into_response(self) -> ImageAnalysisResponse {
        ImageAnalysisResponse {
            caption: self.caption,
            dense_captions: self.dense_captions,
            text_content: self.read_lines.map(|lines| lines.join(" ")),
            error: None,
        }
    }
}

/// 图像分析服务
#[async_trait]
pub trait VisionClient: Send + Sync {
    /// 分析一张图片
    async fn analyze(&self, image: &[u8]) -> Result<VisionAnalysis>;
}
