//! # Data Models Module / 数据模型模块
//!
//! This module defines the pipeline's data structures: the three stages, the
//! state machine that sequences them, the failure taxonomy and the report
//! produced at the end of a run.
//!
//! 此模块定义流水线的数据结构：三个阶段、对其进行排序的状态机、
//! 失败分类以及运行结束时生成的报告。

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::core::config::{BuildPlan, Generator, Variant};
use crate::infra::command::{RunOutcome, SpawnError, serialize_secs};
use crate::infra::t;

/// One discrete unit of the pipeline.
/// 流水线中的一个独立阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Configure,
    Build,
    Test,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Configure, Stage::Build, Stage::Test];

    /// Localized stage name for display.
    pub fn label(self, locale: &str) -> String {
        match self {
            Stage::Configure => t!("stage.configure", locale = locale).to_string(),
            Stage::Build => t!("stage.build", locale = locale).to_string(),
            Stage::Test => t!("stage.test", locale = locale).to_string(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Configure => "configure",
            Stage::Build => "build",
            Stage::Test => "test",
        })
    }
}

/// Enumerates the possible reasons for a stage failure.
/// 枚举阶段失败的可能原因。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The process could not be started.
    /// 进程无法启动。
    Spawn,
    /// The process ran to completion with a non-zero status.
    /// 进程运行结束但返回了非零状态。
    NonZeroExit,
    /// The process overran the stage deadline and was killed.
    /// 进程超出阶段截止时间并被终止。
    Timeout,
}

/// Why a stage failed, with the outcome when there is one.
/// 阶段失败的原因，以及（如有）对应的运行结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StageFailure {
    Spawn { message: String },
    NonZeroExit { outcome: RunOutcome },
    Timeout { outcome: RunOutcome },
}

impl StageFailure {
    pub fn reason(&self) -> FailureReason {
        match self {
            StageFailure::Spawn { .. } => FailureReason::Spawn,
            StageFailure::NonZeroExit { .. } => FailureReason::NonZeroExit,
            StageFailure::Timeout { .. } => FailureReason::Timeout,
        }
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        match self {
            StageFailure::Spawn { .. } => None,
            StageFailure::NonZeroExit { outcome } | StageFailure::Timeout { outcome } => Some(outcome),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.reason() == FailureReason::Timeout
    }

    fn from_outcome(outcome: &RunOutcome) -> Self {
        if outcome.is_timed_out() {
            StageFailure::Timeout {
                outcome: outcome.clone(),
            }
        } else {
            StageFailure::NonZeroExit {
                outcome: outcome.clone(),
            }
        }
    }

    /// Localized one-line description, e.g. "exited with code 2".
    pub fn describe(&self, locale: &str) -> String {
        match self {
            StageFailure::Spawn { message } => {
                t!("failure.spawn", locale = locale, error = message).to_string()
            }
            StageFailure::NonZeroExit { outcome } => {
                t!("failure.exit_code", locale = locale, code = outcome.exit_code()).to_string()
            }
            StageFailure::Timeout { outcome } => t!(
                "failure.timeout",
                locale = locale,
                secs = format!("{:.2}", outcome.duration().as_secs_f64())
            )
            .to_string(),
        }
    }
}

/// The orchestration state machine.
///
/// `Idle → Configuring → Building → Testing → {Succeeded, Failed}`. Terminal
/// states absorb every further event.
///
/// 编排状态机。终止状态会吸收之后的所有事件。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Configuring,
    Building,
    Testing,
    Succeeded,
    Failed { stage: Stage, failure: StageFailure },
}

impl PipelineState {
    /// `Idle → Configuring`; any other state is returned unchanged.
    pub fn start(self) -> Self {
        match self {
            PipelineState::Idle => PipelineState::Configuring,
            other => other,
        }
    }

    /// The stage whose process should run next, if the machine is mid-pipeline.
    pub fn current_stage(&self) -> Option<Stage> {
        match self {
            PipelineState::Configuring => Some(Stage::Configure),
            PipelineState::Building => Some(Stage::Build),
            PipelineState::Testing => Some(Stage::Test),
            _ => None,
        }
    }

    /// Applies the result of the current stage.
    ///
    /// Configure and build advance only on a completed run with exit code 0;
    /// the test stage succeeds on exit code 0. Everything else fails at the
    /// current stage.
    ///
    /// 应用当前阶段的结果。配置和构建阶段仅在进程正常结束且退出码为 0 时前进；
    /// 测试阶段在退出码为 0 时成功。其余情况均在当前阶段失败。
    pub fn advance(self, result: &Result<RunOutcome, SpawnError>) -> Self {
        let Some(stage) = self.current_stage() else {
            return self;
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                return PipelineState::Failed {
                    stage,
                    failure: StageFailure::Spawn {
                        message: e.to_string(),
                    },
                };
            }
        };

        let passed = match stage {
            Stage::Configure | Stage::Build => outcome.is_completed() && outcome.exit_code() == 0,
            Stage::Test => outcome.exit_code() == 0,
        };

        if !passed {
            return PipelineState::Failed {
                stage,
                failure: StageFailure::from_outcome(outcome),
            };
        }

        match stage {
            Stage::Configure => PipelineState::Building,
            Stage::Build => PipelineState::Testing,
            Stage::Test => PipelineState::Succeeded,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Succeeded | PipelineState::Failed { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PipelineState::Succeeded)
    }

    /// The harness's own exit status for this state: 0 on success, 124 when
    /// the failing stage timed out, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineState::Succeeded => 0,
            PipelineState::Failed { failure, .. } if failure.is_timeout() => 124,
            _ => 1,
        }
    }
}

/// What happened in one executed stage.
/// 单个已执行阶段的记录。
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    /// The command line as it was run, shell-quoted.
    pub command: String,
    #[serde(rename = "timeout_secs", serialize_with = "serialize_secs")]
    pub timeout: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RunOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawn_error: Option<String>,
}

impl StageRecord {
    pub fn new(stage: Stage, command: String, timeout: Duration, result: &Result<RunOutcome, SpawnError>) -> Self {
        let (outcome, spawn_error) = match result {
            Ok(outcome) => (Some(outcome.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            stage,
            command,
            timeout,
            outcome,
            spawn_error,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.outcome.as_ref().map(RunOutcome::duration)
    }

    pub fn passed(&self) -> bool {
        self.outcome.as_ref().is_some_and(|o| o.exit_code() == 0 && !o.is_timed_out())
    }
}

/// The final, serializable result of one orchestration run.
///
/// 一次编排运行的最终可序列化结果。
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Local>,
    pub variant: Variant,
    pub generator: Generator,
    pub build_dir: String,
    pub state: PipelineState,
    pub stages: Vec<StageRecord>,
    #[serde(rename = "total_secs", serialize_with = "serialize_secs")]
    pub total_duration: Duration,
}

impl PipelineReport {
    pub fn new(plan: &BuildPlan) -> Self {
        Self {
            started_at: Local::now(),
            variant: plan.variant,
            generator: plan.generator,
            build_dir: plan.build_dir.display().to_string(),
            state: PipelineState::Idle,
            stages: Vec::new(),
            total_duration: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    /// The failing stage and why, if the run failed.
    pub fn failure(&self) -> Option<(Stage, &StageFailure)> {
        match &self.state {
            PipelineState::Failed { stage, failure } => Some((*stage, failure)),
            _ => None,
        }
    }

    pub fn record(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage)
    }
}
