// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心数据结构，包括：
/// - 查询（query）：自然语言查询及其分类
/// - 站点发现结果（discovery）：候选站点及其来源、相关度
/// - 提取内容（scraped_content）：页面正文、元数据与质量分
pub mod discovery;
pub mod query;
pub mod scraped_content;
