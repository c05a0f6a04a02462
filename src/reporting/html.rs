//! # HTML Reporting Module / HTML 报告模块
//!
//! Renders a pipeline report as one self-contained HTML page: a summary of the
//! run, a table of the three stages and the captured output of the failing
//! stage.
//!
//! 将流水线报告渲染为一个独立的 HTML 页面：运行摘要、三个阶段的表格，
//! 以及失败阶段捕获的输出。

use anyhow::{Context, Result};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::Path;

use crate::core::models::{PipelineReport, Stage, StageRecord};
use crate::infra::t;

const HTML_STYLE: &str = r#"
body { font-family: -apple-system, Segoe UI, Helvetica, Arial, sans-serif; margin: 2rem; color: #222; }
.summary-container { display: flex; gap: 2rem; margin-bottom: 1.5rem; }
.summary-item .label { display: block; color: #666; font-size: 0.85rem; }
table { border-collapse: collapse; width: 100%; }
th, td { border-bottom: 1px solid #ddd; padding: 0.5rem; text-align: left; }
.status-Passed { color: #1a7f37; font-weight: bold; }
.status-Failed, .status-Timeout, .status-Spawn { color: #cf222e; font-weight: bold; }
.status-Skipped { color: #888; }
pre.output-content { background: #f6f8fa; padding: 1rem; overflow-x: auto; }
"#;

/// Writes the HTML report for `report` to `output_path`.
///
/// # Errors / 错误
/// Returns an error if the file cannot be written.
/// 如果无法写入文件，则返回错误。
pub fn generate_html_report(report: &PipelineReport, output_path: &Path, locale: &str) -> Result<()> {
    let page = render(report, locale);
    fs::write(output_path, page.into_string())
        .with_context(|| t!("report.write_failed", locale = locale, path = output_path.display()))?;
    Ok(())
}

/// Renders the page without writing it.
pub fn render(report: &PipelineReport, locale: &str) -> Markup {
    let overall = if report.is_success() {
        ("status-Passed", t!("status.passed", locale = locale))
    } else {
        ("status-Failed", t!("status.failed", locale = locale))
    };

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (t!("html_report.title", locale = locale)) }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (t!("html_report.title", locale = locale)) }
                div class="summary-container" {
                    div class="summary-item" {
                        span class=(overall.0) { (overall.1) }
                        span class="label" { (t!("html_report.result", locale = locale)) }
                    }
                    div class="summary-item" {
                        span { (report.variant.as_str()) }
                        span class="label" { (t!("summary.variant", locale = locale)) }
                    }
                    div class="summary-item" {
                        span { (report.generator.cmake_name()) }
                        span class="label" { (t!("summary.generator", locale = locale)) }
                    }
                    div class="summary-item" {
                        span { (format!("{:.2}s", report.total_duration.as_secs_f64())) }
                        span class="label" { (t!("summary.total", locale = locale)) }
                    }
                    div class="summary-item" {
                        span { (report.started_at.format("%Y-%m-%d %H:%M:%S").to_string()) }
                        span class="label" { (t!("html_report.started_at", locale = locale)) }
                    }
                }
                table {
                    thead {
                        tr {
                            th { (t!("html_report.header.stage", locale = locale)) }
                            th { (t!("html_report.header.status", locale = locale)) }
                            th { (t!("html_report.header.duration", locale = locale)) }
                            th { (t!("html_report.header.exit_code", locale = locale)) }
                            th { (t!("html_report.header.command", locale = locale)) }
                        }
                    }
                    tbody {
                        @for stage in Stage::ALL {
                            (stage_row(stage, report.record(stage), locale))
                        }
                    }
                }
                @if let Some((stage, failure)) = report.failure() {
                    h2 { (t!("failure_banner", locale = locale)) }
                    p { (stage.label(locale)) ": " (failure.describe(locale)) }
                    @if let Some(outcome) = failure.outcome() {
                        @if !outcome.output().is_empty() {
                            pre class="output-content" { (outcome.output()) }
                        }
                    }
                }
            }
        }
    }
}

fn stage_row(stage: Stage, record: Option<&StageRecord>, locale: &str) -> Markup {
    let Some(record) = record else {
        return html! {
            tr {
                td { (stage.label(locale)) }
                td class="status-Skipped" { (t!("status.skipped", locale = locale)) }
                td { "N/A" }
                td {}
                td {}
            }
        };
    };

    let (class, status) = match &record.outcome {
        Some(o) if o.is_timed_out() => ("status-Timeout", t!("status.timeout", locale = locale)),
        Some(o) if o.exit_code() == 0 => ("status-Passed", t!("status.passed", locale = locale)),
        Some(_) => ("status-Failed", t!("status.failed", locale = locale)),
        None => ("status-Spawn", t!("status.spawn_failed", locale = locale)),
    };

    html! {
        tr {
            td { (stage.label(locale)) }
            td class=(class) { (status) }
            td {
                @if let Some(d) = record.duration() {
                    (format!("{:.2}s", d.as_secs_f64()))
                } @else {
                    "N/A"
                }
            }
            td {
                @if let Some(o) = &record.outcome {
                    (o.exit_code())
                } @else if let Some(e) = &record.spawn_error {
                    (e)
                }
            }
            td { code { (record.command) } }
        }
    }
}
