//! # Stage Planning Module / 阶段计划模块
//!
//! Derives the command line and deadline of each stage from a [`BuildPlan`].
//! Every command carries the build directory as its working directory, so no
//! stage depends on the harness's own current directory.
//!
//! 根据 [`BuildPlan`] 推导每个阶段的命令行和截止时间。
//! 每个命令都以构建目录作为工作目录，因此任何阶段都不依赖于框架自身的当前目录。

use anyhow::{Context, Result, bail};
use std::time::Duration;

use crate::core::config::BuildPlan;
use crate::core::models::Stage;
use crate::infra::{command::Command, t};

/// The fully-derived invocation for one stage.
/// 单个阶段完全推导出的调用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    pub stage: Stage,
    pub command: Command,
    pub timeout: Duration,
}

/// Plans a single stage.
///
/// # Arguments
/// * `plan` - The resolved build plan
/// * `stage` - Which stage to plan
/// * `filter` - Optional test filter, only used by the test stage
///
/// # Errors
/// Fails when the filter cannot be split with shell quoting rules.
pub fn plan_stage(plan: &BuildPlan, stage: Stage, filter: Option<&str>) -> Result<StagePlan> {
    let (command, timeout) = match stage {
        Stage::Configure => (configure_command(plan), plan.timeouts.configure),
        Stage::Build => (build_command(plan), plan.timeouts.build),
        Stage::Test => (test_command(plan, filter)?, plan.timeouts.test),
    };

    Ok(StagePlan {
        stage,
        command: command
            .current_dir(&plan.build_dir)
            .envs(plan.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .capture_output(plan.capture_output),
        timeout,
    })
}

/// Plans all three stages in pipeline order.
pub fn plan_pipeline(plan: &BuildPlan, filter: Option<&str>) -> Result<Vec<StagePlan>> {
    Stage::ALL
        .into_iter()
        .map(|stage| plan_stage(plan, stage, filter))
        .collect()
}

/// `cmake -DCMAKE_BUILD_TYPE=<type> -G <generator> [variant flag] [extra args] <source dir>`
pub fn configure_command(plan: &BuildPlan) -> Command {
    if let Some(line) = &plan.commands.configure {
        return Command::shell(line);
    }

    let mut args = vec![
        "cmake".to_string(),
        format!("-DCMAKE_BUILD_TYPE={}", plan.build_type),
        "-G".to_string(),
        plan.generator.cmake_name().to_string(),
    ];
    if let Some(flag) = plan.variant.cmake_flag() {
        args.push(flag.to_string());
    }
    args.extend(plan.configure_args.iter().cloned());
    args.push(plan.source_dir.display().to_string());
    Command::argv(args)
}

pub fn build_command(plan: &BuildPlan) -> Command {
    match &plan.commands.build {
        Some(line) => Command::shell(line),
        None => Command::argv(plan.generator.build_args(plan.parallelism)),
    }
}

/// The test binary (behind the optional launcher) followed by the filter.
/// The filter is split with shell quoting rules on both paths, so a shell
/// override receives the same arguments as the derived command.
pub fn test_command(plan: &BuildPlan, filter: Option<&str>) -> Result<Command> {
    let filter_args = split_filter(filter)?;

    if let Some(line) = &plan.commands.test {
        if filter_args.is_empty() {
            return Ok(Command::shell(line));
        }
        let quoted = shlex::try_join(filter_args.iter().map(String::as_str))
            .with_context(|| t!("planner.bad_filter", filter = filter.unwrap_or_default()))?;
        return Ok(Command::shell(format!("{line} {quoted}")));
    }

    let mut args = plan.test_launcher.clone();
    args.push(plan.test_binary.display().to_string());
    args.extend(filter_args);
    Ok(Command::argv(args))
}

fn split_filter(filter: Option<&str>) -> Result<Vec<String>> {
    let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) else {
        return Ok(Vec::new());
    };
    match shlex::split(filter) {
        Some(args) => Ok(args),
        None => bail!(t!("planner.bad_filter", filter = filter)),
    }
}
