//! 字幕增强模块
//!
//! 对视觉接口返回的字幕做两件事：
//! - 清洗紧邻重复的词组 (cleaner.rs)
//! - 在字幕前补一句随机引导语 (intro.rs)
//!
//! 区域字幕按置信度降序排列，只有前两条会补引导语，其余仅清洗。
//! 本模块不做任何 I/O，调用方拿到完整的视觉结果后再调用。

pub mod cleaner;
pub mod intro;

pub use cleaner::clean_caption_text;
pub use intro::{has_intro, FixedIntro, IntroSource, RandomIntro, INTRO_PHRASES};

use crate::model::analysis::{DenseCaption, ImageAnalysisResponse};
use std::cmp::Ordering;
use tracing::debug;

/// 补引导语的区域字幕条数
pub const ENHANCED_DENSE_CAPTIONS: usize = 2;

/// 字幕增强器
pub struct CaptionEnhancer {
    intro: Box<dyn IntroSource>,
}

impl Default for CaptionEnhancer {
    fn default() -> Self {
        Self::new(RandomIntro)
    }
}

impl std::fmt::Debug for CaptionEnhancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionEnhancer")
            .field("catalog_size", &INTRO_PHRASES.len())
            .finish()
    }
}

impl CaptionEnhancer {
    pub fn new(intro: impl IntroSource + 'static) -> Self {
        Self {
            intro: Box::new(intro),
        }
    }

    /// 随机取一条引导语
    pub fn pick_intro(&self) -> &'static str {
        let index = self.intro.pick_index(INTRO_PHRASES.len()) % INTRO_PHRASES.len();
        INTRO_PHRASES[index]
    }

    /// 增强单条字幕：缺失或空串原样返回，否则清洗后按需补引导语
    pub fn enhance_caption(&self, caption: Option<&str>) -> Option<String> {
        let caption = caption?;
        if caption.is_empty() {
            return Some(String::new());
        }
        Some(self.with_intro(clean_caption_text(caption)))
    }

    /// 增强区域字幕：按置信度降序排列，全部清洗，仅前两条补引导语
    pub fn enhance_dense_captions(&self, captions: &[DenseCaption]) -> Vec<DenseCaption> {
        let mut sorted: Vec<&DenseCaption> = captions.iter().collect();
        sorted.sort_by(|a, b| compare_confidence_desc(a.confidence, b.confidence));

        sorted
            .into_iter()
            .enumerate()
            .map(|(rank, caption)| {
                let cleaned = clean_caption_text(&caption.text);
                let text = if rank < ENHANCED_DENSE_CAPTIONS {
                    self.with_intro(cleaned)
                } else {
                    cleaned
                };
                DenseCaption {
                    text,
                    confidence: caption.confidence,
                }
            })
            .collect()
    }

    /// 增强完整响应，返回新值，其余字段保持不变
    pub fn enhance_response(&self, response: &ImageAnalysisResponse) -> ImageAnalysisResponse {
        let enhanced = ImageAnalysisResponse {
            caption: self.enhance_caption(response.caption.as_deref()),
            dense_captions: self.enhance_dense_captions(&response.dense_captions),
            ..response.clone()
        };
        debug!(
            target: "caption",
            event = "caption.response.enhanced",
            has_caption = enhanced.caption.is_some(),
            dense_captions = enhanced.dense_captions.len()
        );
        enhanced
    }

    fn with_intro(&self, cleaned: String) -> String {
        if has_intro(&cleaned) {
            cleaned
        } else {
            format!("{} {}", self.pick_intro(), cleaned)
        }
    }
}

/// 置信度降序比较，缺失值排在所有数值之后（包括负数）
fn compare_confidence_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed() -> CaptionEnhancer {
        CaptionEnhancer::new(FixedIntro(1))
    }

    fn starts_with_one_intro(text: &str, rest: &str) -> bool {
        INTRO_PHRASES
            .iter()
            .any(|phrase| text == format!("{phrase} {rest}"))
    }

    #[test]
    fn test_enhance_caption_absent_and_empty() {
        let enhancer = fixed();
        assert_eq!(enhancer.enhance_caption(None), None);
        assert_eq!(enhancer.enhance_caption(Some("")), Some(String::new()));
    }

    #[test]
    fn test_enhance_caption_adds_single_intro() {
        let enhancer = fixed();
        assert_eq!(
            enhancer.enhance_caption(Some("a dog a dog running in a park")),
            Some("The image shows a dog running in a park".to_string())
        );
    }

    #[test]
    fn test_enhance_caption_random_intro_from_catalog() {
        let enhancer = CaptionEnhancer::default();
        let caption = "a cat a cat sitting on a mat";
        for _ in 0..50 {
            let enhanced = enhancer.enhance_caption(Some(caption)).unwrap();
            assert!(starts_with_one_intro(&enhanced, &clean_caption_text(caption)));
        }
    }

    #[test]
    fn test_enhance_caption_keeps_existing_intro() {
        let enhancer = fixed();
        assert_eq!(
            enhancer.enhance_caption(Some("The image shows a dog")),
            Some("The image shows a dog".to_string())
        );
        assert_eq!(
            enhancer.enhance_caption(Some("the image shows a dog")),
            Some("the image shows a dog".to_string())
        );
    }

    #[test]
    fn test_enhance_caption_cleans_text_with_existing_intro() {
        let enhancer = fixed();
        assert_eq!(
            enhancer.enhance_caption(Some("the picture depicts a boat a boat")),
            Some("the picture depicts a boat".to_string())
        );
    }

    #[test]
    fn test_enhance_is_stable_on_enhanced_output() {
        let enhancer = CaptionEnhancer::default();
        let once = enhancer.enhance_caption(Some("a red car")).unwrap();
        let twice = enhancer.enhance_caption(Some(&once)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_pick_intro_wraps_out_of_range_index() {
        let enhancer = CaptionEnhancer::new(FixedIntro(INTRO_PHRASES.len() + 2));
        assert_eq!(enhancer.pick_intro(), INTRO_PHRASES[2]);
    }

    #[test]
    fn test_enhance_dense_captions_empty() {
        assert!(fixed().enhance_dense_captions(&[]).is_empty());
    }

    #[test]
    fn test_enhance_dense_captions_orders_and_limits_intro() {
        let enhancer = fixed();
        let input = vec![
            DenseCaption::new("a man", Some(0.9)),
            DenseCaption::new("a hat", Some(0.5)),
            DenseCaption::new("a man in a hat a man in a hat", Some(0.95)),
            DenseCaption::new("a shoe", None),
        ];

        let output = enhancer.enhance_dense_captions(&input);
        let confidences: Vec<Option<f64>> = output.iter().map(|c| c.confidence).collect();
        assert_eq!(confidences, vec![Some(0.95), Some(0.9), Some(0.5), None]);

        assert_eq!(output[0].text, "The image shows a man in a hat");
        assert_eq!(output[1].text, "The image shows a man");
        assert_eq!(output[2].text, "a hat");
        assert_eq!(output[3].text, "a shoe");
    }

    #[test]
    fn test_enhance_dense_captions_missing_confidence_sorts_after_negative() {
        let enhancer = fixed();
        let input = vec![
            DenseCaption::new("none", None),
            DenseCaption::new("negative", Some(-5.0)),
            DenseCaption::new("high", Some(2.5)),
        ];
        let output = enhancer.enhance_dense_captions(&input);
        let confidences: Vec<Option<f64>> = output.iter().map(|c| c.confidence).collect();
        assert_eq!(confidences, vec![Some(2.5), Some(-5.0), None]);
        assert_eq!(output[2].text, "none");
    }

    #[test]
    fn test_enhance_dense_captions_ties_keep_input_order() {
        let enhancer = fixed();
        let input = vec![
            DenseCaption::new("first", Some(0.7)),
            DenseCaption::new("second", Some(0.7)),
            DenseCaption::new("third", Some(0.7)),
        ];
        let output = enhancer.enhance_dense_captions(&input);
        assert_eq!(output[0].text, "The image shows first");
        assert_eq!(output[1].text, "The image shows second");
        assert_eq!(output[2].text, "third");
    }

    #[test]
    fn test_enhance_dense_captions_single_entry() {
        let output = fixed().enhance_dense_captions(&[DenseCaption::new("a tree", None)]);
        assert_eq!(output, vec![DenseCaption::new("The image shows a tree", None)]);
    }

    #[test]
    fn test_enhance_dense_captions_existing_intro_not_duplicated() {
        let output = fixed().enhance_dense_captions(&[
            DenseCaption::new("This visual captures a lake", Some(0.3)),
            DenseCaption::new("a boat", Some(0.8)),
        ]);
        assert_eq!(output[0].text, "The image shows a boat");
        assert_eq!(output[1].text, "This visual captures a lake");
    }

    #[test]
    fn test_enhance_response_keeps_other_fields() {
        let enhancer = fixed();
        let response = ImageAnalysisResponse {
            caption: Some("a dog a dog on grass".to_string()),
            dense_captions: Vec::new(),
            text_content: Some("STOP".to_string()),
            error: None,
        };

        let enhanced = enhancer.enhance_response(&response);
        assert_eq!(
            enhanced.caption.as_deref(),
            Some("The image shows a dog on grass")
        );
        assert!(enhanced.dense_captions.is_empty());
        assert_eq!(enhanced.text_content, response.text_content);
        assert_eq!(enhanced.error, response.error);
        // 原值不被修改
        assert_eq!(response.caption.as_deref(), Some("a dog a dog on grass"));
    }

    #[test]
    fn test_enhance_response_without_caption() {
        let enhancer = fixed();
        let response = ImageAnalysisResponse {
            dense_captions: vec![DenseCaption::new("a cup", Some(0.4))],
            ..Default::default()
        };
        let enhanced = enhancer.enhance_response(&response);
        assert_eq!(enhanced.caption, None);
        assert_eq!(enhanced.dense_captions[0].text, "The image shows a cup");
    }
}
