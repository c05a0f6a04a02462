//! # Config Module Unit Tests / Config 模块单元测试
//!
//! This module tests parsing of `Harness.toml`, the defaults applied to
//! omitted settings, and how the file is resolved into a build plan.
//!
//! 此模块测试 `Harness.toml` 的解析、省略设置时应用的默认值，
//! 以及配置文件如何解析为构建计划。

use harness_runner::core::config::{
    Generator, HarnessConfig, Platform, PlanOverrides, StageTimeouts, TimeoutConfig, Variant,
};
use std::path::Path;
use std::time::Duration;

fn parse(content: &str) -> HarnessConfig {
    toml::from_str(content).expect("config should parse")
}

#[cfg(test)]
mod parsing_tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse(r#"test_binary = "unit_tests""#);

        assert_eq!(config.language, "en");
        assert_eq!(config.source_dir, ".");
        assert_eq!(config.build_type, "Debug");
        assert_eq!(config.build_dir, None);
        assert_eq!(config.variant, None);
        assert!(!config.capture_output);
        assert_eq!(config.timeouts, TimeoutConfig::default());
        assert_eq!(config.timeouts.configure_secs, 7200);
        assert_eq!(config.timeouts.build_secs, 7200);
        assert_eq!(config.timeouts.test_secs, 300);
        assert_eq!(config.timeouts.kill_grace_secs, 5);
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
language = "zh-CN"
source_dir = "src"
build_dir = "out"
build_type = "RelWithDebInfo"
generator = "ninja"
variant = "tsan"
parallelism = 3
test_binary = "all_tests"
test_launcher = ["valgrind", "--error-exitcode=1"]
configure_args = ["-DFOO=1"]
capture_output = true

[variant_defaults]
linux = "asan"

[timeouts]
test_secs = 60

[commands]
build = "make all"

[env]
ASAN_OPTIONS = "detect_leaks=1"

[[runtime_dependencies]]
path = "data"

[[runtime_dependencies]]
path = "bin/helper.dll"
os = ["windows"]
"#,
        );

        assert_eq!(config.generator, Some(Generator::Ninja));
        assert_eq!(config.variant, Some(Variant::Tsan));
        assert_eq!(config.parallelism, Some(3));
        assert_eq!(config.test_launcher, vec!["valgrind", "--error-exitcode=1"]);
        assert_eq!(config.variant_defaults.get("linux"), Some(&Variant::Asan));
        assert_eq!(config.timeouts.test_secs, 60);
        assert_eq!(config.timeouts.build_secs, 7200);
        assert_eq!(config.commands.build.as_deref(), Some("make all"));
        assert_eq!(config.commands.test, None);
        assert_eq!(config.env.get("ASAN_OPTIONS").map(String::as_str), Some("detect_leaks=1"));
        assert_eq!(config.runtime_dependencies.len(), 2);
        assert!(config.runtime_dependencies[0].applies_to(Platform::Macos));
        assert!(config.runtime_dependencies[1].applies_to(Platform::Windows));
        assert!(!config.runtime_dependencies[1].applies_to(Platform::Linux));
    }

    #[test]
    fn test_unknown_variant_is_rejected() {
        let result = toml::from_str::<HarnessConfig>(
            r#"
test_binary = "unit_tests"
variant = "msan"
"#,
        );
        assert!(result.is_err());
        assert!("msan".parse::<Variant>().is_err());
    }

    #[test]
    fn test_missing_test_binary_is_rejected() {
        assert!(toml::from_str::<HarnessConfig>(r#"language = "en""#).is_err());
    }

    #[test]
    fn test_variant_from_str() {
        assert_eq!("asan".parse::<Variant>().unwrap(), Variant::Asan);
        assert_eq!("UBSAN".parse::<Variant>().unwrap(), Variant::Ubsan);
        assert_eq!("none".parse::<Variant>().unwrap(), Variant::None);
        assert_eq!(Variant::Tsan.cmake_flag(), Some("-DSANITIZE_THREAD=On"));
        assert_eq!(Variant::None.cmake_flag(), None);
    }

    #[test]
    fn test_load_reports_missing_file() {
        let result = HarnessConfig::load(Path::new("definitely/not/here/Harness.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let mut config = HarnessConfig::new("unit_tests");
        config.variant_defaults.insert("linux".into(), Variant::Asan);
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(parse(&text), config);
    }
}

#[cfg(test)]
mod resolve_tests {
    use super::*;

    fn base() -> &'static Path {
        Path::new("/project")
    }

    #[test]
    fn test_default_build_dir_is_per_platform() {
        let config = HarnessConfig::new("unit_tests");
        let plan = config
            .resolve(base(), &PlanOverrides::default(), Platform::Linux)
            .unwrap();

        assert_eq!(plan.build_dir, Path::new("/project/build/Linux"));
        assert_eq!(plan.test_binary, Path::new("/project/build/Linux/unit_tests"));
        assert_eq!(plan.generator, Generator::UnixMakefiles);
        assert_eq!(plan.variant, Variant::None);
        assert!(plan.parallelism >= 1);
        assert_eq!(plan.timeouts, StageTimeouts::default());
    }

    #[test]
    fn test_windows_defaults() {
        let config = HarnessConfig::new("unit_tests");
        let plan = config
            .resolve(base(), &PlanOverrides::default(), Platform::Windows)
            .unwrap();

        assert_eq!(plan.generator, Generator::NmakeMakefiles);
        assert!(plan.test_binary.to_string_lossy().ends_with("unit_tests.exe"));
    }

    #[test]
    fn test_variant_precedence() {
        let mut config = HarnessConfig::new("unit_tests");
        config.variant_defaults.insert("linux".into(), Variant::Asan);

        let plan = config
            .resolve(base(), &PlanOverrides::default(), Platform::Linux)
            .unwrap();
        assert_eq!(plan.variant, Variant::Asan);

        let plan = config
            .resolve(base(), &PlanOverrides::default(), Platform::Macos)
            .unwrap();
        assert_eq!(plan.variant, Variant::None);

        config.variant = Some(Variant::Ubsan);
        assert_eq!(config.default_variant(Platform::Linux), Variant::Ubsan);

        let overrides = PlanOverrides {
            variant: Some(Variant::Tsan),
            ..Default::default()
        };
        let plan = config.resolve(base(), &overrides, Platform::Linux).unwrap();
        assert_eq!(plan.variant, Variant::Tsan);
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut config = HarnessConfig::new("unit_tests");
        config.parallelism = Some(2);
        config.build_dir = Some("out".into());

        let overrides = PlanOverrides {
            build_dir: Some("/elsewhere".into()),
            parallelism: Some(8),
            test_timeout: Some(Duration::from_secs(9)),
            capture_output: true,
            ..Default::default()
        };
        let plan = config.resolve(base(), &overrides, Platform::Linux).unwrap();

        assert_eq!(plan.build_dir, Path::new("/elsewhere"));
        assert_eq!(plan.parallelism, 8);
        assert_eq!(plan.timeouts.test, Duration::from_secs(9));
        assert!(plan.capture_output);

        let plan = config
            .resolve(base(), &PlanOverrides::default(), Platform::Linux)
            .unwrap();
        assert_eq!(plan.build_dir, Path::new("/project/out"));
        assert_eq!(plan.parallelism, 2);
    }

    #[test]
    fn test_zero_kill_grace_in_file_is_rejected() {
        let config = parse(
            r#"
test_binary = "unit_tests"

[timeouts]
kill_grace_secs = 0
"#,
        );
        let err = config
            .resolve(base(), &PlanOverrides::default(), Platform::Linux)
            .unwrap_err();
        assert!(err.to_string().contains("kill_grace"));
    }

    #[test]
    fn test_zero_parallelism_is_clamped() {
        let mut config = HarnessConfig::new("unit_tests");
        config.parallelism = Some(0);
        let plan = config
            .resolve(base(), &PlanOverrides::default(), Platform::Linux)
            .unwrap();
        assert_eq!(plan.parallelism, 1);
    }

    #[test]
    fn test_zero_timeouts_are_rejected() {
        let mut config = HarnessConfig::new("unit_tests");
        config.timeouts.build_secs = 0;
        assert!(
            config
                .resolve(base(), &PlanOverrides::default(), Platform::Linux)
                .is_err()
        );

        let mut config = HarnessConfig::new("unit_tests");
        config.timeouts.kill_grace_secs = 0;
        assert!(
            config
                .resolve(base(), &PlanOverrides::default(), Platform::Linux)
                .is_err()
        );

        let config = HarnessConfig::new("unit_tests");
        let overrides = PlanOverrides {
            test_timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        assert!(config.resolve(base(), &overrides, Platform::Linux).is_err());
    }

    #[test]
    fn test_empty_test_binary_is_rejected() {
        let config = HarnessConfig::new("  ");
        assert!(
            config
                .resolve(base(), &PlanOverrides::default(), Platform::Linux)
                .is_err()
        );
    }

    #[test]
    fn test_runtime_dependencies_filtered_by_platform() {
        let config = parse(
            r#"
test_binary = "unit_tests"

[[runtime_dependencies]]
path = "data"

[[runtime_dependencies]]
path = "helper.dll"
os = ["windows"]
"#,
        );

        let plan = config
            .resolve(base(), &PlanOverrides::default(), Platform::Linux)
            .unwrap();
        assert_eq!(plan.runtime_dependencies, vec![Path::new("/project/data").to_path_buf()]);

        let plan = config
            .resolve(base(), &PlanOverrides::default(), Platform::Windows)
            .unwrap();
        assert_eq!(plan.runtime_dependencies.len(), 2);
    }
}
