// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::InvalidUrlError;
use url::Url;

/// 校验并规范化URL
///
/// 缺少协议时默认补全为 https；只接受 http/https；主机名必须包含点号。
///
/// # 参数
///
/// * `raw` - 调用方传入的URL字符串
///
/// # 返回值
///
/// * `Ok(String)` - 带协议前缀的URL
/// * `Err(InvalidUrlError)` - URL不合法
pub fn normalize_url(raw: &str) -> Result<String, InvalidUrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(InvalidUrlError::Parse(raw.to_string()));
    }

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        if let Some(scheme) = bare_scheme(raw) {
            return Err(InvalidUrlError::UnsupportedScheme {
                scheme: scheme.to_string(),
                url: raw.to_string(),
            });
        }
        format!("https://{}", raw)
    };

    let parsed = Url::parse(&candidate).map_err(|_| InvalidUrlError::Parse(raw.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(InvalidUrlError::UnsupportedScheme {
                scheme: other.to_string(),
                url: raw.to_string(),
            })
        }
    }

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| InvalidUrlError::MissingHost(candidate.clone()))?;
    if !host.contains('.') {
        return Err(InvalidUrlError::MissingDot(candidate));
    }

    Ok(candidate)
}

// "mailto:x@y.com" carries a scheme, "example.com:8080" and "localhost:80" do not
fn bare_scheme(raw: &str) -> Option<&str> {
    let (prefix, rest) = raw.split_once(':')?;
    let looks_like_scheme = !prefix.is_empty()
        && prefix.chars().all(|c| c.is_ascii_alphabetic())
        && !rest.starts_with(|c: char| c.is_ascii_digit());
    looks_like_scheme.then_some(prefix)
}

/// 域名键：小写主机名，非默认端口时附带端口
///
/// 用于限流器分组与按域名去重
pub fn domain_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// 源：scheme + host (+ port)
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

/// 将相对链接解析为绝对URL
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    Url::parse(base).ok()?.join(href).ok().map(|u| u.to_string())
}
