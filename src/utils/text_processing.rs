// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;

/// 截断标记
pub const TRUNCATION_MARKER: &str = "... [Content truncated]";

static AD_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)advertisement|sponsored|promoted|click here|buy now|sign up|subscribe")
        .expect("Failed to compile ad phrase regex")
});

static MULTI_SPACES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+").expect("Failed to compile space regex"));

static MULTI_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n\s*\n+").expect("Failed to compile blank line regex"));

static ANY_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Failed to compile whitespace regex"));

/// 去除常见广告用语
pub fn remove_ad_phrases(content: &str) -> String {
    AD_PHRASES.replace_all(content, "").into_owned()
}

/// 规范化空白：合并行内空白、压缩多余空行并去除行首尾空白
pub fn normalize_whitespace(content: &str) -> String {
    let content = MULTI_SPACES.replace_all(content, " ");
    let content = MULTI_BLANK_LINES.replace_all(&content, "\n\n");
    content
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

/// 去除连续重复的行
pub fn remove_duplicate_lines(content: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for line in content.split('\n') {
        if kept.last() != Some(&line) {
            kept.push(line);
        }
    }
    kept.join("\n")
}

/// 把所有空白序列压缩为单个空格
pub fn collapse_whitespace(content: &str) -> String {
    ANY_WHITESPACE.replace_all(content.trim(), " ").into_owned()
}

/// 按UTF-8字节数截断文本
///
/// 未超限时原样返回；超限时取不切断多字节字符的最长前缀并追加截断标记，
/// 保证结果字节数不超过 `limit`。
pub fn truncate_to_byte_limit(content: &str, limit: usize) -> String {
    if content.len() <= limit {
        return content.to_string();
    }

    let budget = limit.saturating_sub(TRUNCATION_MARKER.len());
    if budget == 0 {
        // marker alone does not fit
        let end = floor_char_boundary(TRUNCATION_MARKER, limit);
        return TRUNCATION_MARKER[..end].to_string();
    }

    let end = floor_char_boundary(content, budget);
    let mut truncated = String::with_capacity(end + TRUNCATION_MARKER.len());
    truncated.push_str(&content[..end]);
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut end = index;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}
