//! # Configuration Module / 配置模块
//!
//! Parses `Harness.toml` and resolves it, together with command-line and
//! environment overrides supplied by the CLI layer, into an immutable
//! [`BuildPlan`] that every pipeline stage receives explicitly.
//!
//! 解析 `Harness.toml`，并将其与 CLI 层提供的命令行和环境变量覆盖项一起
//! 解析为不可变的 [`BuildPlan`]，每个流水线阶段都会显式接收它。

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::infra::{fs::resolve_path, t};

/// A named build configuration modifier that changes the configure flags.
/// 改变配置阶段参数的具名构建变体（通常是 sanitizer）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// AddressSanitizer
    Asan,
    /// UndefinedBehaviorSanitizer
    Ubsan,
    /// ThreadSanitizer
    Tsan,
    /// Plain build without instrumentation / 不带插桩的普通构建
    #[default]
    None,
}

impl Variant {
    pub const ALL: [Variant; 4] = [Variant::Asan, Variant::Ubsan, Variant::Tsan, Variant::None];

    /// The CMake cache entry enabling this variant, if any.
    pub fn cmake_flag(self) -> Option<&'static str> {
        match self {
            Variant::Asan => Some("-DSANITIZE_ADDRESS=On"),
            Variant::Ubsan => Some("-DSANITIZE_UNDEFINED=On"),
            Variant::Tsan => Some("-DSANITIZE_THREAD=On"),
            Variant::None => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Asan => "asan",
            Variant::Ubsan => "ubsan",
            Variant::Tsan => "tsan",
            Variant::None => "none",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Variant::ALL
            .into_iter()
            .find(|v| v.as_str() == wanted)
            .with_context(|| t!("config.unknown_variant", value = s))
    }
}

/// The CMake generator, which also decides how the build stage is invoked.
/// CMake 生成器，同时决定构建阶段的调用方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Generator {
    UnixMakefiles,
    NmakeMakefiles,
    Ninja,
}

impl Generator {
    /// The name CMake expects after `-G`.
    pub fn cmake_name(self) -> &'static str {
        match self {
            Generator::UnixMakefiles => "Unix Makefiles",
            Generator::NmakeMakefiles => "NMake Makefiles",
            Generator::Ninja => "Ninja",
        }
    }

    /// The build tool invocation for this generator. `nmake` has no parallel flag.
    pub fn build_args(self, parallelism: usize) -> Vec<String> {
        match self {
            Generator::UnixMakefiles => vec!["make".to_string(), format!("-j{parallelism}")],
            Generator::Ninja => vec!["ninja".to_string(), format!("-j{parallelism}")],
            Generator::NmakeMakefiles => vec!["nmake".to_string()],
        }
    }
}

/// The platform the harness runs on, used only to pick defaults.
/// 运行平台，仅用于选择默认值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Macos,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Maps a `std::env::consts::OS` value.
    pub fn from_os(os: &str) -> Self {
        match os {
            "linux" => Platform::Linux,
            "macos" => Platform::Macos,
            "windows" => Platform::Windows,
            _ => Platform::Other,
        }
    }

    /// The key used in `[variant_defaults]` and `runtime_dependencies.os`.
    pub fn os_key(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Macos => "macos",
            Platform::Windows => "windows",
            Platform::Other => std::env::consts::OS,
        }
    }

    /// Directory name used for the default build directory, `build/<name>`.
    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Linux => "Linux",
            Platform::Macos => "Darwin",
            Platform::Windows => "Windows",
            Platform::Other => "Other",
        }
    }

    pub fn default_generator(self) -> Generator {
        match self {
            Platform::Windows => Generator::NmakeMakefiles,
            _ => Generator::UnixMakefiles,
        }
    }

    pub fn executable_extension(self) -> &'static str {
        match self {
            Platform::Windows => ".exe",
            _ => "",
        }
    }
}

/// Deadlines per stage, in seconds as written in the config file.
/// 每个阶段的截止时间（配置文件中以秒为单位）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub configure_secs: u64,
    pub build_secs: u64,
    pub test_secs: u64,
    pub kill_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            configure_secs: 2 * 60 * 60,
            build_secs: 2 * 60 * 60,
            test_secs: 5 * 60,
            kill_grace_secs: 5,
        }
    }
}

/// Optional shell lines replacing the derived command of a stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageCommands {
    pub configure: Option<String>,
    pub build: Option<String>,
    pub test: Option<String>,
}

/// A file or directory copied into the build directory before the test stage.
/// 在测试阶段之前复制到构建目录中的文件或目录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeDependency {
    pub path: String,
    /// Platforms (`std::env::consts::OS` values) the dependency applies to; empty means all.
    #[serde(default)]
    pub os: Vec<String>,
}

impl RuntimeDependency {
    pub fn applies_to(&self, platform: Platform) -> bool {
        self.os.is_empty() || self.os.iter().any(|os| os == platform.os_key())
    }
}

/// The `Harness.toml` file.
/// `Harness.toml` 配置文件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// The language for the runner's output messages (e.g., "en", "zh-CN").
    /// 运行器输出消息的语言（例如 "en", "zh-CN"）。
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_source_dir")]
    pub source_dir: String,
    /// Defaults to `build/<platform>` next to the config file.
    #[serde(default)]
    pub build_dir: Option<String>,
    #[serde(default = "default_build_type")]
    pub build_type: String,
    #[serde(default)]
    pub generator: Option<Generator>,
    #[serde(default)]
    pub variant: Option<Variant>,
    #[serde(default)]
    pub parallelism: Option<usize>,
    /// File name of the test binary, without the platform extension.
    pub test_binary: String,
    /// Prefix placed before the test binary, e.g. a debugger invocation.
    #[serde(default)]
    pub test_launcher: Vec<String>,
    #[serde(default)]
    pub configure_args: Vec<String>,
    #[serde(default)]
    pub capture_output: bool,
    /// Caller-supplied default variant per platform, keyed by OS name.
    /// 由调用方提供的各平台默认变体，以操作系统名称为键。
    #[serde(default)]
    pub variant_defaults: BTreeMap<String, Variant>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub commands: StageCommands,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtime_dependencies: Vec<RuntimeDependency>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_source_dir() -> String {
    ".".to_string()
}

fn default_build_type() -> String {
    "Debug".to_string()
}

impl HarnessConfig {
    /// A config with every optional setting at its default.
    pub fn new(test_binary: impl Into<String>) -> Self {
        Self {
            language: default_language(),
            source_dir: default_source_dir(),
            build_dir: None,
            build_type: default_build_type(),
            generator: None,
            variant: None,
            parallelism: None,
            test_binary: test_binary.into(),
            test_launcher: Vec::new(),
            configure_args: Vec::new(),
            capture_output: false,
            variant_defaults: BTreeMap::new(),
            timeouts: TimeoutConfig::default(),
            commands: StageCommands::default(),
            env: BTreeMap::new(),
            runtime_dependencies: Vec::new(),
        }
    }

    /// Reads and parses a config file.
    ///
    /// # Returns
    /// The parsed config and the directory relative paths are resolved against
    pub fn load(path: &Path) -> Result<(Self, PathBuf)> {
        let config_path = fs::canonicalize(path)
            .with_context(|| t!("config.read_failed", path = path.display()))?;
        let content = fs::read_to_string(&config_path)
            .with_context(|| t!("config.read_failed", path = config_path.display()))?;
        let config: HarnessConfig =
            toml::from_str(&content).with_context(|| t!("config.parse_failed", path = config_path.display()))?;
        let base_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok((config, base_dir))
    }

    /// The variant for `platform` when none is given explicitly.
    pub fn default_variant(&self, platform: Platform) -> Variant {
        self.variant
            .or_else(|| self.variant_defaults.get(platform.os_key()).copied())
            .unwrap_or_default()
    }

    /// Combines the file with caller overrides into a [`BuildPlan`].
    /// Relative paths are resolved against `base_dir`.
    ///
    /// 将配置文件与调用方覆盖项合并为 [`BuildPlan`]。
    /// 相对路径以 `base_dir` 为基准解析。
    pub fn resolve(&self, base_dir: &Path, overrides: &PlanOverrides, platform: Platform) -> Result<BuildPlan> {
        let source_dir = resolve_path(&self.source_dir, base_dir)?;
        let build_dir = match (&overrides.build_dir, &self.build_dir) {
            (Some(dir), _) => dir.clone(),
            (None, Some(raw)) => resolve_path(raw, base_dir)?,
            (None, None) => base_dir.join("build").join(platform.display_name()),
        };

        if self.test_binary.trim().is_empty() {
            bail!(t!("config.empty_test_binary"));
        }
        let test_binary = build_dir.join(format!(
            "{}{}",
            self.test_binary.trim(),
            platform.executable_extension()
        ));

        let parallelism = overrides
            .parallelism
            .or(self.parallelism)
            .unwrap_or_else(num_cpus::get)
            .max(1);

        let mut timeouts = StageTimeouts::try_from(&self.timeouts)?;
        if let Some(test) = overrides.test_timeout {
            if test.is_zero() {
                bail!(t!("config.zero_timeout", stage = "test"));
            }
            timeouts.test = test;
        }

        let runtime_dependencies = self
            .runtime_dependencies
            .iter()
            .filter(|dep| dep.applies_to(platform))
            .map(|dep| resolve_path(&dep.path, base_dir))
            .collect::<Result<Vec<_>>>()?;

        Ok(BuildPlan {
            platform,
            source_dir,
            build_dir,
            generator: self.generator.unwrap_or_else(|| platform.default_generator()),
            build_type: self.build_type.clone(),
            variant: overrides.variant.unwrap_or_else(|| self.default_variant(platform)),
            parallelism,
            test_binary,
            test_launcher: self.test_launcher.clone(),
            configure_args: self.configure_args.clone(),
            commands: expand_stage_commands(&self.commands)?,
            runtime_dependencies,
            env: self.env.clone(),
            timeouts,
            capture_output: overrides.capture_output || self.capture_output,
        })
    }
}

fn expand_stage_commands(commands: &StageCommands) -> Result<StageCommands> {
    let expand = |raw: &Option<String>| -> Result<Option<String>> {
        raw.as_deref()
            .map(|line| {
                shellexpand::full(line)
                    .map(|s| s.into_owned())
                    .with_context(|| t!("fs.expand_failed", value = line))
            })
            .transpose()
    };
    Ok(StageCommands {
        configure: expand(&commands.configure)?,
        build: expand(&commands.build)?,
        test: expand(&commands.test)?,
    })
}

/// Values taken from the command line or environment; they win over the file.
/// 来自命令行或环境变量的值，优先于配置文件。
#[derive(Debug, Clone, Default)]
pub struct PlanOverrides {
    pub variant: Option<Variant>,
    pub build_dir: Option<PathBuf>,
    pub parallelism: Option<usize>,
    pub test_timeout: Option<Duration>,
    pub capture_output: bool,
}

/// Resolved deadlines for the three stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageTimeouts {
    pub configure: Duration,
    pub build: Duration,
    pub test: Duration,
    pub kill_grace: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        let config = TimeoutConfig::default();
        Self {
            configure: Duration::from_secs(config.configure_secs),
            build: Duration::from_secs(config.build_secs),
            test: Duration::from_secs(config.test_secs),
            kill_grace: Duration::from_secs(config.kill_grace_secs),
        }
    }
}

impl TryFrom<&TimeoutConfig> for StageTimeouts {
    type Error = anyhow::Error;

    fn try_from(config: &TimeoutConfig) -> Result<Self> {
        for (stage, secs) in [
            ("configure", config.configure_secs),
            ("build", config.build_secs),
            ("test", config.test_secs),
            ("kill_grace", config.kill_grace_secs),
        ] {
            if secs == 0 {
                bail!(t!("config.zero_timeout", stage = stage));
            }
        }
        Ok(Self {
            configure: Duration::from_secs(config.configure_secs),
            build: Duration::from_secs(config.build_secs),
            test: Duration::from_secs(config.test_secs),
            kill_grace: Duration::from_secs(config.kill_grace_secs),
        })
    }
}

/// Everything one orchestration run needs. Immutable once resolved.
///
/// 一次编排运行所需的全部信息。解析完成后不可变。
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub platform: Platform,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub generator: Generator,
    pub build_type: String,
    pub variant: Variant,
    pub parallelism: usize,
    /// Absolute path of the test binary, platform extension included.
    pub test_binary: PathBuf,
    pub test_launcher: Vec<String>,
    pub configure_args: Vec<String>,
    pub commands: StageCommands,
    pub runtime_dependencies: Vec<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub timeouts: StageTimeouts,
    pub capture_output: bool,
}
