//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command: it loads `Harness.toml`, resolves
//! the build plan, drives the configure → build → test pipeline and reports
//! the outcome through the console, optional report files and the exit status.
//!
//! 此模块实现 `run` 命令：加载 `Harness.toml`，解析构建计划，
//! 驱动 配置 → 构建 → 测试 流水线，并通过控制台、可选的报告文件和退出状态报告结果。

use anyhow::Result;
use colored::*;
use std::{path::PathBuf, process::ExitCode, time::Duration};

use crate::{
    core::{
        config::{BuildPlan, HarnessConfig, Platform, PlanOverrides, Variant},
        execution::Orchestrator,
        planner,
    },
    infra::t,
    reporting::{generate_html_report, print_failure_details, print_summary, write_json_report},
};

/// Everything the `run` subcommand needs, already merged with the environment.
/// `run` 子命令所需的全部参数，已与环境变量合并。
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub config: PathBuf,
    /// Explicit `--lang`; when absent the config file's language is used.
    pub lang: Option<String>,
    pub variant: Option<Variant>,
    pub filter: Option<String>,
    pub build_dir: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub test_timeout: Option<Duration>,
    pub capture: bool,
    pub dry_run: bool,
    pub html: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

/// Executes the run command with the provided arguments.
///
/// # Returns
/// The exit status for the harness process: success only when every stage passed
pub async fn execute(args: RunArgs) -> Result<ExitCode> {
    let (config, base_dir) = HarnessConfig::load(&args.config)?;
    let locale = args.lang.clone().unwrap_or_else(|| config.language.clone());
    rust_i18n::set_locale(&locale);

    let overrides = PlanOverrides {
        variant: args.variant,
        build_dir: args.build_dir.clone(),
        parallelism: args.jobs,
        test_timeout: args.test_timeout,
        capture_output: args.capture,
    };
    let plan = config.resolve(&base_dir, &overrides, Platform::current())?;

    print_plan_header(&plan, &args, &locale);

    if args.dry_run {
        print_dry_run(&plan, args.filter.as_deref(), &locale)?;
        return Ok(ExitCode::SUCCESS);
    }

    let orchestrator = Orchestrator::for_plan(&plan, &locale);
    let report = orchestrator.run(&plan, args.filter.as_deref()).await?;

    print_summary(&report, &locale);

    if let Some(report_path) = &args.html {
        println!(
            "\n{}",
            t!("report.generating_html", locale = &locale, path = report_path.display())
        );
        if let Err(e) = generate_html_report(&report, report_path, &locale) {
            eprintln!("{} {:#}", t!("report.html_failed", locale = &locale).red(), e);
        }
    }
    if let Some(report_path) = &args.json {
        println!(
            "{}",
            t!("report.generating_json", locale = &locale, path = report_path.display())
        );
        if let Err(e) = write_json_report(&report, report_path, &locale) {
            eprintln!("{} {:#}", t!("report.json_failed", locale = &locale).red(), e);
        }
    }

    if report.is_success() {
        println!("\n{}", t!("pipeline_passed", locale = &locale).green().bold());
    } else {
        print_failure_details(&report, &locale);
    }

    Ok(ExitCode::from(report.state.exit_code()))
}

fn print_plan_header(plan: &BuildPlan, args: &RunArgs, locale: &str) {
    println!(
        "{}",
        t!("loading_config", locale = locale, path = args.config.display())
    );
    println!(
        "{}",
        t!("current_os", locale = locale, os = plan.platform.os_key()).cyan()
    );
    println!(
        "{}",
        t!(
            "plan_variant",
            locale = locale,
            variant = plan.variant.as_str().yellow(),
            generator = plan.generator.cmake_name()
        )
    );
    println!(
        "{}",
        t!("plan_build_dir", locale = locale, path = plan.build_dir.display())
    );
    println!(
        "{}",
        t!(
            "plan_test_timeout",
            locale = locale,
            secs = plan.timeouts.test.as_secs()
        )
        .cyan()
    );
    if let Some(filter) = &args.filter {
        println!("{}", t!("plan_filter", locale = locale, filter = filter));
    }
}

fn print_dry_run(plan: &BuildPlan, filter: Option<&str>, locale: &str) -> Result<()> {
    let stage_plans = planner::plan_pipeline(plan, filter)?;
    println!("\n{}", t!("dry_run_banner", locale = locale).bold());
    for stage_plan in stage_plans {
        println!(
            "  - {:<10} [{}s] {}",
            stage_plan.stage.label(locale),
            stage_plan.timeout.as_secs(),
            stage_plan.command
        );
    }
    Ok(())
}
