//! # Orchestrator Integration Tests / 编排器集成测试
//!
//! These tests drive the configure → build → test pipeline, first through a
//! recording executor (to check sequencing without processes), then against
//! scripted projects whose stages are plain shell lines.
//!
//! 这些测试驱动 配置 → 构建 → 测试 流水线：先通过记录型执行器
//! （在不启动进程的情况下检查顺序），再针对各阶段为普通 shell 命令的脚本化项目运行。

mod common;

use common::{StageScripts, resolve_plan, setup_scripted_project};
use harness_runner::core::execution::{Orchestrator, StageExecutor};
use harness_runner::core::models::{FailureReason, PipelineState, Stage};
use harness_runner::infra::command::{Command, RunOutcome, SpawnError};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Replays scripted results and remembers every command it was asked to run.
struct RecordingExecutor {
    results: Mutex<VecDeque<Result<RunOutcome, SpawnError>>>,
    calls: Mutex<Vec<(String, Duration)>>,
    working_dirs: Mutex<Vec<Option<PathBuf>>>,
}

impl RecordingExecutor {
    fn new(results: Vec<Result<RunOutcome, SpawnError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            calls: Mutex::new(Vec::new()),
            working_dirs: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, Duration)> {
        self.calls.lock().unwrap().clone()
    }

    fn working_dirs(&self) -> Vec<Option<PathBuf>> {
        self.working_dirs.lock().unwrap().clone()
    }
}

impl StageExecutor for RecordingExecutor {
    async fn execute(&self, command: &Command, timeout: Duration) -> Result<RunOutcome, SpawnError> {
        self.calls.lock().unwrap().push((command.to_string(), timeout));
        self.working_dirs
            .lock()
            .unwrap()
            .push(command.working_dir().map(|dir| dir.to_path_buf()));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RunOutcome::exited(0, Duration::ZERO)))
    }
}

fn exited(code: i32) -> Result<RunOutcome, SpawnError> {
    Ok(RunOutcome::exited(code, Duration::from_millis(5)))
}

#[cfg(test)]
mod sequencing_tests {
    use super::*;

    #[tokio::test]
    async fn test_all_stages_run_in_order() {
        let (_temp, config_path) = setup_scripted_project(&StageScripts::default(), 30);
        let plan = resolve_plan(&config_path);
        let orchestrator = Orchestrator::new(RecordingExecutor::new(vec![]), "en");

        let report = orchestrator.run(&plan, Some("Smoke")).await.unwrap();

        assert_eq!(report.state, PipelineState::Succeeded);
        assert!(report.is_success());
        assert_eq!(report.stages.len(), 3);
        let calls = orchestrator.executor().calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].0, "true Smoke");
        assert_eq!(calls[2].1, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_configure_failure_short_circuits() {
        let (_temp, config_path) = setup_scripted_project(&StageScripts::default(), 30);
        let plan = resolve_plan(&config_path);
        let orchestrator = Orchestrator::new(RecordingExecutor::new(vec![exited(1)]), "en");

        let report = orchestrator.run(&plan, None).await.unwrap();

        assert_eq!(orchestrator.executor().calls().len(), 1);
        let (stage, failure) = report.failure().expect("pipeline should fail");
        assert_eq!(stage, Stage::Configure);
        assert_eq!(failure.reason(), FailureReason::NonZeroExit);
        assert!(report.record(Stage::Build).is_none());
        assert!(report.record(Stage::Test).is_none());
        assert_eq!(report.state.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_build_spawn_error_fails_build() {
        let (_temp, config_path) = setup_scripted_project(&StageScripts::default(), 30);
        let plan = resolve_plan(&config_path);
        let orchestrator = Orchestrator::new(
            RecordingExecutor::new(vec![exited(0), Err(SpawnError::EmptyCommand)]),
            "en",
        );

        let report = orchestrator.run(&plan, None).await.unwrap();

        assert_eq!(orchestrator.executor().calls().len(), 2);
        let (stage, failure) = report.failure().unwrap();
        assert_eq!(stage, Stage::Build);
        assert_eq!(failure.reason(), FailureReason::Spawn);
        let record = report.record(Stage::Build).unwrap();
        assert!(record.outcome.is_none());
        assert!(record.spawn_error.is_some());
    }

    #[tokio::test]
    async fn test_test_timeout_is_reported_as_timeout() {
        let (_temp, config_path) = setup_scripted_project(&StageScripts::default(), 30);
        let plan = resolve_plan(&config_path);
        let orchestrator = Orchestrator::new(
            RecordingExecutor::new(vec![
                exited(0),
                exited(0),
                Ok(RunOutcome::timeout(Duration::from_secs(30))),
            ]),
            "en",
        );

        let report = orchestrator.run(&plan, None).await.unwrap();

        let (stage, failure) = report.failure().unwrap();
        assert_eq!(stage, Stage::Test);
        assert!(failure.is_timeout());
        assert_eq!(report.state.exit_code(), 124);
    }

    #[tokio::test]
    async fn test_stages_run_in_canonical_build_dir() {
        let (temp, config_path) = setup_scripted_project(&StageScripts::default(), 30);
        let mut plan = resolve_plan(&config_path);
        // A relative detour that only canonicalization removes.
        plan.build_dir = temp.path().join("out").join("..").join("out");
        let orchestrator = Orchestrator::new(RecordingExecutor::new(vec![]), "en");

        let report = orchestrator.run(&plan, None).await.unwrap();

        let canonical = std::fs::canonicalize(temp.path().join("out")).unwrap();
        assert_eq!(report.build_dir, canonical.display().to_string());
        let dirs = orchestrator.executor().working_dirs();
        assert_eq!(dirs.len(), 3);
        assert!(dirs.iter().all(|dir| dir.as_deref() == Some(canonical.as_path())));
    }

    #[tokio::test]
    async fn test_unparsable_filter_fails_before_any_stage() {
        let (_temp, config_path) = setup_scripted_project(&StageScripts::default(), 30);
        let plan = resolve_plan(&config_path);
        let orchestrator = Orchestrator::new(RecordingExecutor::new(vec![]), "en");

        let result = orchestrator.run(&plan, Some("'unterminated")).await;

        assert!(result.is_err());
        assert!(orchestrator.executor().calls().is_empty());
    }
}

#[cfg(unix)]
#[cfg(test)]
mod process_tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_successful_scripted_pipeline() {
        let scripts = StageScripts {
            configure: "touch configured",
            build: "test -f configured && touch built",
            test: "test -f built",
        };
        let (temp, config_path) = setup_scripted_project(&scripts, 30);
        let plan = resolve_plan(&config_path);

        let report = Orchestrator::for_plan(&plan, "en").run(&plan, None).await.unwrap();

        assert!(report.is_success(), "state: {:?}", report.state);
        assert!(temp.path().join("out").join("built").exists());
        assert!(report.stages.iter().all(|r| r.passed()));
    }

    #[tokio::test]
    async fn test_hung_test_binary_is_killed() {
        let scripts = StageScripts {
            test: "sleep 10",
            ..Default::default()
        };
        let (_temp, config_path) = setup_scripted_project(&scripts, 1);
        let plan = resolve_plan(&config_path);

        let started = Instant::now();
        let report = Orchestrator::for_plan(&plan, "en").run(&plan, None).await.unwrap();
        let elapsed = started.elapsed();

        let (stage, failure) = report.failure().unwrap();
        assert_eq!(stage, Stage::Test);
        assert_eq!(failure.reason(), FailureReason::Timeout);
        let outcome = failure.outcome().unwrap();
        assert_eq!(outcome.exit_code(), 255);
        assert!(!outcome.is_completed());
        assert!(elapsed < Duration::from_secs(5), "pipeline took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let scripts = StageScripts {
            configure: "echo run >> configure.log",
            ..Default::default()
        };
        let (temp, config_path) = setup_scripted_project(&scripts, 30);
        let plan = resolve_plan(&config_path);
        let orchestrator = Orchestrator::for_plan(&plan, "en");

        assert!(orchestrator.run(&plan, None).await.unwrap().is_success());
        assert!(orchestrator.run(&plan, None).await.unwrap().is_success());

        let log = fs::read_to_string(temp.path().join("out").join("configure.log")).unwrap();
        assert_eq!(log.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_runtime_dependencies_are_staged_before_tests() {
        let scripts = StageScripts {
            test: "test -f fixture.txt",
            ..Default::default()
        };
        let (temp, config_path) = setup_scripted_project(&scripts, 30);
        fs::write(temp.path().join("fixture.txt"), "data").unwrap();
        let mut content = fs::read_to_string(&config_path).unwrap();
        content.push_str("\n[[runtime_dependencies]]\npath = \"fixture.txt\"\n");
        fs::write(&config_path, content).unwrap();
        let plan = resolve_plan(&config_path);

        let report = Orchestrator::for_plan(&plan, "en").run(&plan, None).await.unwrap();

        assert!(report.is_success(), "state: {:?}", report.state);
        assert!(temp.path().join("out").join("fixture.txt").exists());
    }

    #[tokio::test]
    async fn test_failing_build_captures_output() {
        let scripts = StageScripts {
            build: "echo compile error >&2; exit 2",
            ..Default::default()
        };
        let (_temp, config_path) = setup_scripted_project(&scripts, 30);
        let (config, base_dir) = harness_runner::core::config::HarnessConfig::load(&config_path).unwrap();
        let overrides = harness_runner::core::config::PlanOverrides {
            capture_output: true,
            ..Default::default()
        };
        let plan = config
            .resolve(&base_dir, &overrides, harness_runner::core::config::Platform::current())
            .unwrap();

        let report = Orchestrator::for_plan(&plan, "en").run(&plan, None).await.unwrap();

        let (stage, failure) = report.failure().unwrap();
        assert_eq!(stage, Stage::Build);
        let outcome = failure.outcome().unwrap();
        assert_eq!(outcome.exit_code(), 2);
        assert!(outcome.output().contains("compile error"));
        assert!(report.record(Stage::Test).is_none());
    }
}
