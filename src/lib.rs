//! # Harness Runner Library / Harness Runner 库
//!
//! This library provides the core functionality for the Harness Runner tool,
//! a configuration-driven build-and-test harness for CMake projects. It runs
//! the configure, build and test stages in order, each under its own timeout,
//! and guarantees that a hung process is killed and reported instead of
//! blocking the pipeline.
//!
//! 此库为 Harness Runner 工具提供核心功能，
//! 这是一个配置驱动的 CMake 项目构建与测试框架。它按顺序运行配置、构建和测试阶段，
//! 每个阶段都有自己的超时限制，并保证挂起的进程会被终止并报告，而不会阻塞流水线。
//!
//! ## Modules / 模块
//!
//! - `core` - Configuration, pipeline state machine and stage planning
//! - `infra` - Infrastructure services like process execution and file system operations
//! - `reporting` - Console, HTML and JSON reports
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 配置、流水线状态机和阶段规划
//! - `infra` - 基础设施服务，如进程执行和文件系统操作
//! - `reporting` - 控制台、HTML 和 JSON 报告
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::execution;
pub use core::models;
pub use infra::command::{Command, ProcessRunner, RunOutcome, SpawnError, TIMEOUT_EXIT_CODE};

/// Detects the system locale and maps it onto one of the bundled locales.
///
/// It attempts to match the full locale (e.g., "zh-CN"), then just the
/// language code (e.g., "en"), and finally falls back to "en".
pub fn detect_locale() -> String {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    let available_locales = rust_i18n::available_locales!();

    if available_locales.contains(&locale.as_str()) {
        return locale;
    }
    locale
        .split(['-', '_'])
        .next()
        .filter(|lang_code| available_locales.contains(lang_code))
        .unwrap_or("en")
        .to_string()
}

/// Initializes the application's internationalization (i18n) based on the system locale.
pub fn init() {
    rust_i18n::set_locale(&detect_locale());
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
