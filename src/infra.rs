//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for the harness:
//! deadline-bounded process execution and file system preparation.
//!
//! 此模块为测试框架提供基础设施服务：
//! 有截止时间的进程执行以及文件系统准备。

pub mod command;
pub mod fs;

// Re-export i18n functions for easier access
pub use rust_i18n::t;
