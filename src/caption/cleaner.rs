//! 字幕文本清洗
//!
//! 视觉接口偶尔会返回"口吃"式字幕，例如 `a cat a cat sitting on a mat`。
//! 这里做一次从左到右的贪心扫描，把紧邻重复的词组折叠成一份。

use std::collections::HashSet;

/// 重复词组的最短长度
pub const MIN_PATTERN_LEN: usize = 2;
/// 重复词组的最长长度
pub const MAX_PATTERN_LEN: usize = 7;
/// 不超过该词数的文本原样返回
const SHORT_TEXT_WORDS: usize = 3;

/// 清洗字幕中紧邻重复的词组
///
/// 规则：
/// - 词数 <= 3 时原样返回（包括空串）
/// - 在每个位置按长度 2..=7 从小到大尝试，首个满足 `[i, i+L) == [i+L, i+2L)` 的长度生效
/// - 同一次调用中首次出现的词组保留一份，之后再次命中的同一词组整体丢弃
/// - 命中后游标前进 `2L`，否则输出当前词并前进 1
/// - 输出以单个空格拼接
pub fn clean_caption_text(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= SHORT_TEXT_WORDS {
        return text.to_string();
    }

    let mut cleaned: Vec<&str> = Vec::with_capacity(words.len());
    let mut seen_patterns: HashSet<&[&str]> = HashSet::new();
    let mut i = 0;

    while i < words.len() {
        match repeated_pattern_len(&words, i) {
            Some(len) => {
                let pattern = &words[i..i + len];
                if seen_patterns.insert(pattern) {
                    cleaned.extend_from_slice(pattern);
                }
                i += len * 2;
            }
            None => {
                cleaned.push(words[i]);
                i += 1;
            }
        }
    }

    cleaned.join(" ")
}

/// 返回位置 `start` 处紧邻重复的最短词组长度
fn repeated_pattern_len(words: &[&str], start: usize) -> Option<usize> {
    let remaining = words.len() - start;
    (MIN_PATTERN_LEN..=MAX_PATTERN_LEN)
        .take_while(|len| len * 2 <= remaining)
        .find(|&len| words[start..start + len] == words[start + len..start + len * 2])
}
