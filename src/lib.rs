// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含查询与结果模型，以及发现、提取、限流和编排服务
pub mod domain;

/// 引擎模块
///
/// 带 robots 检查、限流与重试的 HTTP 抓取
pub mod engines;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 后台清理任务
pub mod workers;
