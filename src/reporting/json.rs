//! # JSON Reporting Module / JSON 报告模块
//!
//! Writes the pipeline report as pretty-printed JSON for CI systems to consume.
//!
//! 将流水线报告写为格式化的 JSON，供 CI 系统使用。

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::core::models::PipelineReport;
use crate::infra::t;

pub fn to_json(report: &PipelineReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn write_json_report(report: &PipelineReport, output_path: &Path, locale: &str) -> Result<()> {
    fs::write(output_path, to_json(report)?)
        .with_context(|| t!("report.write_failed", locale = locale, path = output_path.display()))
}
