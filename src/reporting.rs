//! # Reporting Module / 报告模块
//!
//! This module handles the generation and display of pipeline reports in multiple formats.
//! It provides functionality for printing colorful, formatted summaries to the console
//! and for writing HTML and JSON report files.
//!
//! 此模块处理多种格式的流水线报告生成和显示。
//! 它提供在控制台打印彩色格式化摘要以及写入 HTML 和 JSON 报告文件的功能。

pub mod console;
pub mod html;
pub mod json;

// Re-export common reporting functions
pub use console::{print_failure_details, print_summary};
pub use html::generate_html_report;
pub use json::write_json_report;
