// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// - 领域模型（models）：查询、发现结果与提取结果
/// - 服务（services）：发现、提取、限流与编排
pub mod models;
pub mod services;
