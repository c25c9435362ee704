// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use siftrs::utils::errors::InvalidUrlError;
use siftrs::utils::url_utils::{domain_key, normalize_url, origin_of, resolve_url};

#[test]
fn test_normalize_accepts_common_inputs() {
    let cases = [
        ("example.com", "https://example.com"),
        ("www.example.com/docs", "https://www.example.com/docs"),
        ("http://example.com", "http://example.com"),
        ("example.com:8080/x", "https://example.com:8080/x"),
        ("https://127.0.0.1:3000/p", "https://127.0.0.1:3000/p"),
    ];

    for (input, expected) in cases {
        assert_eq!(normalize_url(input).unwrap(), expected, "input {input}");
    }
}

#[test]
fn test_normalize_rejects_bad_inputs() {
    assert!(matches!(normalize_url(""), Err(InvalidUrlError::Parse(_))));
    assert!(matches!(
        normalize_url("ftp://example.com/file"),
        Err(InvalidUrlError::UnsupportedScheme { .. })
    ));
    assert!(matches!(
        normalize_url("mailto:someone@example.com"),
        Err(InvalidUrlError::UnsupportedScheme { .. })
    ));
    assert!(matches!(
        normalize_url("http://localhost/path"),
        Err(InvalidUrlError::MissingDot(_))
    ));
}

#[test]
fn test_domain_key_and_origin_include_non_default_port() {
    assert_eq!(domain_key("https://Example.COM/a").as_deref(), Some("example.com"));
    assert_eq!(domain_key("https://example.com:443/a").as_deref(), Some("example.com"));
    assert_eq!(domain_key("http://127.0.0.1:8081/").as_deref(), Some("127.0.0.1:8081"));
    assert_eq!(
        origin_of("http://127.0.0.1:8081/a/b?q").as_deref(),
        Some("http://127.0.0.1:8081")
    );
    assert_eq!(domain_key("not a url"), None);
}

#[test]
fn test_resolve_relative_links() {
    let base = "https://example.com/blog/post";
    assert_eq!(
        resolve_url(base, "/img/a.png").as_deref(),
        Some("https://example.com/img/a.png")
    );
    assert_eq!(
        resolve_url(base, "other").as_deref(),
        Some("https://example.com/blog/other")
    );
    assert_eq!(
        resolve_url(base, "https://cdn.example.net/x.png").as_deref(),
        Some("https://cdn.example.net/x.png")
    );
}
