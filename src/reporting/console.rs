//! # Console Reporting Module / 控制台报告模块
//!
//! This module handles the display of pipeline reports in the console.
//! It provides functionality for printing colorful, formatted summaries with
//! internationalization support.
//!
//! 此模块处理控制台中流水线报告的显示。
//! 它提供打印彩色格式化摘要的功能，支持国际化。

use colored::*;

use crate::core::models::{FailureReason, PipelineReport, Stage};
use crate::infra::t;

/// Prints a formatted summary of the pipeline to the console.
/// Stages that never ran (because an earlier one failed) are shown as skipped.
///
/// 在控制台打印格式化的流水线摘要。
/// 因前一阶段失败而未运行的阶段显示为已跳过。
///
/// # Output Format / 输出格式
/// ```text
/// --- Pipeline Summary ---
///   - Passed     | Configure  |      1.23s | exit 0
///   - Timeout     | Test       |    300.01s | exit 255
///   - Skipped    | ...
/// ```
pub fn print_summary(report: &PipelineReport, locale: &str) {
    println!("\n{}", t!("summary_banner", locale = locale).bold());
    println!(
        "  {}: {}  {}: {}  {}: {}",
        t!("summary.variant", locale = locale),
        report.variant,
        t!("summary.generator", locale = locale),
        report.generator.cmake_name(),
        t!("summary.build_dir", locale = locale),
        report.build_dir
    );

    for stage in Stage::ALL {
        let name = stage.label(locale);
        let Some(record) = report.record(stage) else {
            println!(
                "  - {:<12} | {:<10} | {:>10} |",
                t!("status.skipped", locale = locale).dimmed(),
                name,
                "N/A"
            );
            continue;
        };

        let duration_str = record
            .duration()
            .map(|d| format!("{:.2}s", d.as_secs_f64()))
            .unwrap_or_else(|| "N/A".to_string());

        let (status, code) = match &record.outcome {
            Some(outcome) if outcome.is_timed_out() => (
                t!("status.timeout", locale = locale).red(),
                outcome.exit_code().to_string(),
            ),
            Some(outcome) if outcome.exit_code() == 0 => (
                t!("status.passed", locale = locale).green(),
                "0".to_string(),
            ),
            Some(outcome) => (
                t!("status.failed", locale = locale).red(),
                outcome.exit_code().to_string(),
            ),
            None => (t!("status.spawn_failed", locale = locale).red(), "-".to_string()),
        };

        println!(
            "  - {:<12} | {:<10} | {:>10} | exit {}",
            status, name, duration_str, code
        );
    }

    println!(
        "  {}: {:.2}s",
        t!("summary.total", locale = locale),
        report.total_duration.as_secs_f64()
    );
}

/// Prints the failing stage, the reason and any captured output.
/// Does nothing for a successful report.
///
/// 打印失败的阶段、原因以及捕获的输出。对成功的报告不做任何操作。
pub fn print_failure_details(report: &PipelineReport, locale: &str) {
    let Some((stage, failure)) = report.failure() else {
        return;
    };

    println!("\n{}", t!("failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));
    println!(
        "{} {}",
        t!("failure.stage", locale = locale).red(),
        stage.label(locale).cyan()
    );
    println!("{}", failure.describe(locale));

    if failure.reason() == FailureReason::Timeout {
        println!("{}", t!("failure.timeout_hint", locale = locale).yellow());
    }

    if let Some(record) = report.record(stage) {
        println!("{} {}", t!("run.command_prefix", locale = locale).blue(), record.command);
    }

    if let Some(outcome) = failure.outcome() {
        if !outcome.output().trim().is_empty() {
            println!("\n--- {} ---\n", t!("failure.output", locale = locale).yellow());
            println!("{}", outcome.output().trim_end());
        }
    }
    println!("{}", "-".repeat(80));
}
