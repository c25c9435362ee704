// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 站点发现（discovery_service）：LLM、规则表与搜索策略合并出候选站点
/// - 内容提取（extraction_service）：抓取页面并通过策略级联提取正文
/// - LLM服务（llm_service）：文本生成能力及其 OpenAI 兼容实现
/// - 限流服务（rate_limiting_service）：按域名串行化并保持请求间隔
/// - 相关度评分（relevance_scorer）：结果的增强质量分、过滤、去重与排序
/// - 抓取编排（scraper_orchestrator）：发现 → 提取 → 后处理
pub mod discovery_service;
pub mod extraction_service;
pub mod llm_service;
pub mod rate_limiting_service;
pub mod relevance_scorer;
pub mod scraper_orchestrator;
