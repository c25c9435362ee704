// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::url_utils::domain_key;

/// 站点的发现来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    LlmGenerated,
    RuleBased,
    SearchEngine,
    UserProvided,
    Referral,
}

/// 站点发现结果
///
/// 生成后不再修改；排序阶段的分数调整会产生新的实例
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub url: String,
    /// 由URL推导的小写域名
    pub domain: String,
    /// 相关度 [0, 1]
    pub relevance_score: f64,
    pub discovery_method: DiscoveryMethod,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    /// 置信度 [0, 1]
    pub confidence: f64,
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveryResult {
    /// 创建发现结果，URL无法解析出主机名时返回 `None`
    pub fn new(
        url: impl Into<String>,
        relevance_score: f64,
        discovery_method: DiscoveryMethod,
        confidence: f64,
    ) -> Option<Self> {
        let url = url.into();
        let domain = domain_key(&url)?;
        Some(Self {
            url,
            domain,
            relevance_score: relevance_score.clamp(0.0, 1.0),
            discovery_method,
            title: None,
            description: None,
            category: None,
            confidence: confidence.clamp(0.0, 1.0),
            discovered_at: Utc::now(),
        })
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    /// 返回调整了相关度的新结果
    pub fn with_relevance(&self, relevance_score: f64) -> Self {
        Self {
            relevance_score: relevance_score.clamp(0.0, 1.0),
            ..self.clone()
        }
    }
}
