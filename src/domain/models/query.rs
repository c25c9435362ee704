// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 查询分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryCategory {
    AiTools,
    MutualFunds,
    General,
    Documentation,
    Tutorial,
    Unknown,
}

impl QueryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryCategory::AiTools => "ai_tools",
            QueryCategory::MutualFunds => "mutual_funds",
            QueryCategory::General => "general",
            QueryCategory::Documentation => "documentation",
            QueryCategory::Tutorial => "tutorial",
            QueryCategory::Unknown => "unknown",
        }
    }

    /// 用于提示词的分类描述
    pub fn description(&self) -> &'static str {
        match self {
            QueryCategory::AiTools => "AI tools, machine learning, and artificial intelligence",
            QueryCategory::MutualFunds => "mutual funds, investment, and financial services",
            QueryCategory::General => "general information and resources",
            QueryCategory::Documentation => "technical documentation and references",
            QueryCategory::Tutorial => "tutorials and learning resources",
            QueryCategory::Unknown => "general information",
        }
    }
}

impl fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryCategory {
    type Err = std::convert::Infallible;

    /// 未识别的分类解析为 `Unknown`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Ok(match normalized.as_str() {
            "ai_tools" | "ai" | "ai_tool" => QueryCategory::AiTools,
            "mutual_funds" | "mutual_fund" | "finance" | "funds" => QueryCategory::MutualFunds,
            "general" => QueryCategory::General,
            "documentation" | "docs" => QueryCategory::Documentation,
            "tutorial" | "tutorials" => QueryCategory::Tutorial,
            _ => QueryCategory::Unknown,
        })
    }
}

/// 抓取查询
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeQuery {
    /// 自然语言查询文本
    pub text: String,
    /// 查询分类
    pub category: QueryCategory,
}

impl ScrapeQuery {
    pub fn new(text: impl Into<String>, category: QueryCategory) -> Self {
        Self {
            text: text.into(),
            category,
        }
    }
}
