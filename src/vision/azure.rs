use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, error, info};
use url::Url;

use super::{VisionAnalysis, VisionClient};
use crate::model::analysis::DenseCaption;
use crate::util::config::VisionConfig;
use crate::util::http_client::HttpClient;

const ANALYZE_PATH: &str = "computervision/imageanalysis:analyze";
const FEATURES: &str = "caption,denseCaptions,read";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Azure AI Vision 图像分析（REST 4.0）客户端
pub struct AzureVisionClient {
    http: HttpClient,
    analyze_url: Url,
    key: String,
}

impl AzureVisionClient {
    pub fn new(config: &VisionConfig, http: HttpClient) -> Result<Self> {
        let analyze_url = build_analyze_url(config)?;
        info!(
            target: "vision.azure",
            event = "vision.client.init",
            endpoint = %config.endpoint,
            api_version = %config.api_version
        );
        Ok(Self {
            http,
            analyze_url,
            key: config.key.clone(),
        })
    }
}

#[async_trait]
impl VisionClient for AzureVisionClient {
    async fn analyze(&self, image: &[u8]) -> Result<VisionAnalysis> {
        let start = Instant::now();
        debug!(
            target: "vision.azure",
            event = "vision.analyze.start",
            size = image.len()
        );

        let response = self
            .http
            .inner()
            .post(self.analyze_url.clone())
            .header(SUBSCRIPTION_KEY_HEADER, &self.key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .context("视觉服务请求失败")?;

        let status = response.status();
        let body = response.text().await.context("读取视觉服务响应失败")?;

        if !status.is_success() {
            let message = parse_error_message(&body).unwrap_or_else(|| body.clone());
            error!(
                target: "vision.azure",
                event = "vision.analyze.failed",
                status = status.as_u16(),
                error = %message
            );
            return Err(anyhow!("视觉服务返回错误 ({}): {}", status.as_u16(), message));
        }

        let analysis = parse_analysis(&body)?;
        info!(
            target: "vision.azure",
            event = "vision.analyze.success",
            has_caption = analysis.caption.is_some(),
            dense_captions = analysis.dense_captions.len(),
            elapsed_ms = start.elapsed().as_millis() as u64
        );
        Ok(analysis)
    }
}

/// 拼接分析接口URL
fn build_analyze_url(config: &VisionConfig) -> Result<Url> {
    let base = format!("{}/", config.endpoint.trim().trim_end_matches('/'));
    let mut url = Url::parse(&base)
        .with_context(|| format!("无效的视觉服务地址: {}", config.endpoint))?
        .join(ANALYZE_PATH)
        .context("拼接视觉服务路径失败")?;

    url.query_pairs_mut()
        .append_pair("api-version", &config.api_version)
        .append_pair("features", FEATURES)
        .append_pair(
            "gender-neutral-caption",
            if config.gender_neutral_caption {
                "true"
            } else {
                "false"
            },
        );
    Ok(url)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    caption_result: Option<CaptionResult>,
    #[serde(default)]
    dense_captions_result: Option<DenseCaptionsResult>,
    #[serde(default)]
    read_result: Option<ReadResult>,
}

#[derive(Debug, Deserialize)]
struct CaptionResult {
    text: String,
}

#[derive(Debug, Deserialize)]
struct DenseCaptionsResult {
    #[serde(default)]
    values: Vec<DenseCaptionValue>,
}

#[derive(Debug, Deserialize)]
struct DenseCaptionValue {
    text: String,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ReadResult {
    #[serde(default)]
    blocks: Vec<ReadBlock>,
}

#[derive(Debug, Deserialize)]
struct ReadBlock {
    #[serde(default)]
    lines: Vec<ReadLine>,
}

#[derive(Debug, Deserialize)]
struct ReadLine {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// 解析分析接口的成功响应
fn parse_analysis(body: &str) -> Result<VisionAnalysis> {
    let result: AnalyzeResult = serde_json::from_str(body).context("视觉服务响应解析失败")?;

    Ok(VisionAnalysis {
        caption: result.caption_result.map(|c| c.text),
        dense_captions: result
            .dense_captions_result
            .map(|d| {
                d.values
                    .into_iter()
                    .map(|v| DenseCaption::new(v.text, v.confidence))
                    .collect()
            })
            .unwrap_or_default(),
        read_lines: result.read_result.map(|r| {
            r.blocks
                .into_iter()
                .flat_map(|block| block.lines)
                .map(|line| line.text)
                .collect()
        }),
    })
}

/// 提取错误响应中的信息
fn parse_error_message(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    Some(match envelope.error.code {
        Some(code) => format!("{}: {}", code, envelope.error.message),
        None => envelope.error.message,
    })
}
