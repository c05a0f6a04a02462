//! # Pipeline Execution Engine Module / 流水线执行引擎模块
//!
//! This module drives the configure → build → test pipeline. It prepares the
//! build directory, runs each stage through a [`StageExecutor`] under the
//! stage's deadline, stops at the first failing stage and returns a
//! [`PipelineReport`]. No stage is retried.
//!
//! 此模块驱动 配置 → 构建 → 测试 流水线。它准备构建目录，
//! 通过 [`StageExecutor`] 在阶段截止时间内运行每个阶段，
//! 在第一个失败的阶段停止并返回 [`PipelineReport`]。不会重试任何阶段。

use anyhow::Result;
use colored::*;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::{
    core::{
        config::BuildPlan,
        models::{PipelineReport, PipelineState, Stage, StageRecord},
        planner,
    },
    infra::{
        command::{Command, ProcessRunner, RunOutcome, SpawnError},
        fs, t,
    },
};

/// Runs one stage command under a deadline. [`ProcessRunner`] is the real
/// implementation; tests substitute their own.
///
/// 在截止时间内运行单个阶段命令。[`ProcessRunner`] 是真实实现；测试可以替换为自己的实现。
pub trait StageExecutor {
    fn execute(
        &self,
        command: &Command,
        timeout: Duration,
    ) -> impl Future<Output = Result<RunOutcome, SpawnError>>;
}

impl StageExecutor for ProcessRunner {
    async fn execute(&self, command: &Command, timeout: Duration) -> Result<RunOutcome, SpawnError> {
        self.run(command, timeout).await
    }
}

/// Sequences the three stages for one build plan.
/// 为一个构建计划依次执行三个阶段。
#[derive(Debug)]
pub struct Orchestrator<E = ProcessRunner> {
    executor: E,
    locale: String,
}

impl Orchestrator<ProcessRunner> {
    /// An orchestrator backed by a [`ProcessRunner`] using the plan's kill grace.
    pub fn for_plan(plan: &BuildPlan, locale: &str) -> Self {
        Self::new(
            ProcessRunner::with_kill_grace(plan.timeouts.kill_grace),
            locale,
        )
    }
}

impl<E: StageExecutor> Orchestrator<E> {
    pub fn new(executor: E, locale: &str) -> Self {
        Self {
            executor,
            locale: locale.to_string(),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Runs the pipeline to a terminal state.
    ///
    /// # Arguments
    /// * `plan` - The resolved build plan; the build directory is created if absent
    /// * `filter` - Optional filter passed to the test binary
    ///
    /// # Returns
    /// A report whose state is `Succeeded` or `Failed`. `Err` is returned only when
    /// the filter cannot be parsed or the filesystem preconditions (build directory,
    /// runtime dependencies) cannot be met; nothing has run yet in the first case.
    ///
    /// 将流水线运行到终止状态。仅当文件系统前置条件（构建目录、运行时依赖）
    /// 无法满足时才返回 `Err`。
    pub async fn run(&self, plan: &BuildPlan, filter: Option<&str>) -> Result<PipelineReport> {
        let started = Instant::now();
        let mut report = PipelineReport::new(plan);

        let stage_plans = planner::plan_pipeline(plan, filter)?;
        let build_dir = fs::ensure_build_dir(&plan.build_dir)?;
        report.build_dir = build_dir.display().to_string();

        let mut state = PipelineState::Idle.start();
        while let Some(stage) = state.current_stage() {
            if stage == Stage::Test && !plan.runtime_dependencies.is_empty() {
                let staged = fs::stage_runtime_dependencies(&plan.runtime_dependencies, &build_dir)?;
                for path in staged {
                    println!(
                        "{}",
                        t!("run.dependency_staged", locale = &self.locale, path = path.display()).dimmed()
                    );
                }
            }

            let Some(stage_plan) = stage_plans.iter().find(|p| p.stage == stage) else {
                break;
            };
            let command = stage_plan.command.clone().current_dir(&build_dir);
            let result = self.run_stage(stage, &command, stage_plan.timeout).await;

            report.stages.push(StageRecord::new(
                stage,
                command.to_string(),
                stage_plan.timeout,
                &result,
            ));
            state = state.advance(&result);
        }

        report.state = state;
        report.total_duration = started.elapsed();
        Ok(report)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        command: &Command,
        timeout: Duration,
    ) -> Result<RunOutcome, SpawnError> {
        let locale = self.locale.as_str();
        let name = stage.label(locale);

        println!(
            "{}",
            t!("run.stage_started", locale = locale, stage = &name).blue()
        );
        println!(
            "{} {}",
            t!("run.command_prefix", locale = locale).blue(),
            command
        );

        let result = self.executor.execute(command, timeout).await;

        match &result {
            Ok(outcome) if outcome.is_timed_out() => println!(
                "{}",
                t!(
                    "run.stage_timeout",
                    locale = locale,
                    stage = &name,
                    timeout = timeout.as_secs_f64()
                )
                .red()
            ),
            Ok(outcome) if outcome.exit_code() == 0 => println!(
                "{}",
                t!(
                    "run.stage_passed",
                    locale = locale,
                    stage = &name,
                    duration = format!("{:.2}", outcome.duration().as_secs_f64())
                )
                .green()
            ),
            Ok(outcome) => println!(
                "{}",
                t!(
                    "run.stage_failed",
                    locale = locale,
                    stage = &name,
                    code = outcome.exit_code(),
                    duration = format!("{:.2}", outcome.duration().as_secs_f64())
                )
                .red()
            ),
            Err(e) => println!(
                "{}",
                t!("run.stage_spawn_failed", locale = locale, stage = &name, error = e).red()
            ),
        }

        result
    }
}
