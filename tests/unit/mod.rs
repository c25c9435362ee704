// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod settings_test;
pub mod text_processing_test;
pub mod url_utils_test;
