// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use siftrs::utils::text_processing::{
    collapse_whitespace, normalize_whitespace, remove_ad_phrases, remove_duplicate_lines,
    truncate_to_byte_limit, TRUNCATION_MARKER,
};

#[test]
fn test_truncation_never_splits_multibyte_characters() {
    let text = "基金投资需要长期坚持，💰 分散风险，控制成本。".repeat(20);

    for limit in [24, 25, 26, 27, 40, 57, 100, 255] {
        let truncated = truncate_to_byte_limit(&text, limit);
        assert!(truncated.len() <= limit, "limit {limit} exceeded");
        assert!(
            truncated.ends_with(TRUNCATION_MARKER) || truncated.len() < TRUNCATION_MARKER.len()
        );
        // slicing at a non-boundary would have panicked inside the function
        assert!(text.starts_with(truncated.trim_end_matches(TRUNCATION_MARKER)));
    }
}

#[test]
fn test_truncation_leaves_short_text_untouched() {
    let text = "短文本";
    assert_eq!(truncate_to_byte_limit(text, text.len()), text);
    assert_eq!(truncate_to_byte_limit(text, 1000), text);
}

#[test]
fn test_truncation_with_tiny_limit_keeps_marker_prefix() {
    let truncated = truncate_to_byte_limit(&"a".repeat(100), 5);
    assert_eq!(truncated, &TRUNCATION_MARKER[..5]);
}

#[test]
fn test_cleaning_pipeline() {
    let raw = "Intro   line\n\n\n\nAdvertisement\nBody\tline\nBody line\nBody line\n";

    let cleaned = remove_duplicate_lines(&normalize_whitespace(&remove_ad_phrases(raw)));

    assert_eq!(cleaned, "Intro line\n\nBody line\n");
    assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
}
