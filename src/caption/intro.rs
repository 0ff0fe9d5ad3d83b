//! 引导语目录与随机来源

use rand::Rng;

/// 固定的引导语目录，顺序即下标
pub const INTRO_PHRASES: [&str; 15] = [
    "In this picture we can see",
    "The image shows",
    "This photograph captures",
    "The scene displays",
    "This view presents",
    "Looking at this image, we observe",
    "The photograph reveals",
    "In this scene, we can identify",
    "This snapshot features",
    "Visible in this image is",
    "The picture depicts",
    "Within this frame, we notice",
    "This visual captures",
    "The image portrays",
    "From this perspective, we can see",
];

/// 引导语的随机来源，测试中可替换为确定性实现
pub trait IntroSource: Send + Sync {
    /// 返回 `[0, len)` 内的下标，`len` 恒大于 0
    fn pick_index(&self, len: usize) -> usize;
}

/// 生产环境使用的均匀随机来源（有放回抽样）
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIntro;

impl IntroSource for RandomIntro {
    fn pick_index(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// 始终返回同一个下标，用于测试和演示
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedIntro(pub usize);

impl IntroSource for FixedIntro {
    fn pick_index(&self, _len: usize) -> usize {
        self.0
    }
}

/// 文本是否已经以目录中的引导语开头（忽略大小写）
pub fn has_intro(text: &str) -> bool {
    let lowered = text.to_lowercase();
    INTRO_PHRASES
        .iter()
        .any(|phrase| lowered.starts_with(&phrase.to_lowercase()))
}
