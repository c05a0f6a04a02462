//! # Core Module / 核心模块
//!
//! This module contains the core functionality of the harness:
//! configuration, pipeline models, stage planning and the orchestrator.
//!
//! 此模块包含测试框架的核心功能：
//! 配置、流水线模型、阶段计划以及编排器。

pub mod config;
pub mod execution;
pub mod models;
pub mod planner;

// Re-exports
pub use config::{BuildPlan, HarnessConfig};
pub use execution::{Orchestrator, StageExecutor};
pub use models::{PipelineReport, PipelineState, Stage};
