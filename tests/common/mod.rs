// Shared test helpers for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use harness_runner::core::config::{BuildPlan, HarnessConfig, Platform, PlanOverrides};
use tempfile::{TempDir, tempdir};

/// Shell overrides for the three stages of a scripted project.
pub struct StageScripts<'a> {
    pub configure: &'a str,
    pub build: &'a str,
    pub test: &'a str,
}

impl Default for StageScripts<'_> {
    fn default() -> Self {
        Self {
            configure: "true",
            build: "true",
            test: "true",
        }
    }
}

/// Creates a temporary project whose `Harness.toml` replaces every stage with
/// a shell line, so no CMake toolchain is needed.
pub fn setup_scripted_project(scripts: &StageScripts<'_>, test_timeout_secs: u64) -> (TempDir, PathBuf) {
    let temp_dir = tempdir().expect("Failed to create temporary directory");
    let config_path = temp_dir.path().join("Harness.toml");
    let content = format!(
        r#"language = "en"
test_binary = "unit_tests"
build_dir = "out"

[timeouts]
configure_secs = 30
build_secs = 30
test_secs = {test_timeout_secs}
kill_grace_secs = 1

[commands]
configure = '{configure}'
build = '{build}'
test = '{test}'
"#,
        configure = scripts.configure,
        build = scripts.build,
        test = scripts.test,
    );
    fs::write(&config_path, content).expect("Failed to write Harness.toml");
    (temp_dir, config_path)
}

/// Loads and resolves the config at `config_path` for the current platform.
pub fn resolve_plan(config_path: &PathBuf) -> BuildPlan {
    let (config, base_dir) = HarnessConfig::load(config_path).expect("Failed to load config");
    config
        .resolve(&base_dir, &PlanOverrides::default(), Platform::current())
        .expect("Failed to resolve plan")
}

/// Helper function to create an invalid TOML configuration
pub fn create_invalid_toml(temp_dir: &TempDir) -> PathBuf {
    let path = temp_dir.path().join("invalid.toml");
    let content = r#"
language = "en"
# Invalid TOML - missing closing bracket
[timeouts
test_secs = 5
"#;
    fs::write(&path, content).unwrap();
    path
}
