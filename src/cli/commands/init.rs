//! # Harness Initialization Module / 测试框架初始化模块
//!
//! This module creates a `Harness.toml` file, either with defaults or through
//! an interactive wizard asking for the test binary, the build type and the
//! default variant for the current platform.
//!
//! 此模块创建 `Harness.toml` 文件，可以使用默认值，也可以通过交互式向导
//! 询问测试二进制、构建类型以及当前平台的默认变体。
//!
//! ## Features / 功能特性
//!
//! - **Interactive Wizard**: Step-by-step guidance for configuration setup
//! - **Overwrite Protection**: Confirmation prompts before overwriting existing configurations
//!
//! - **交互式向导**: 配置设置的逐步指导
//! - **覆盖保护**: 覆盖现有配置前的确认提示

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};
use std::fs;
use std::path::Path;

use crate::core::config::{HarnessConfig, Platform, Variant};
use crate::infra::t;

const DEFAULT_TEST_BINARY: &str = "unit_tests";

/// Comment block written above the serialized config.
const CONFIG_HEADER: &str = "# Build-and-test harness configuration / 构建与测试框架配置
# Stage commands are derived from these settings; see [commands] to override them.
# 各阶段命令由这些设置推导而来；可在 [commands] 中覆盖。

";

/// Runs the interactive wizard (or writes defaults) to generate a config file.
///
/// 运行交互式向导（或直接写入默认值）以生成配置文件。
///
/// # Arguments
/// * `config_path` - Where to write the file
/// * `language` - UI language, also stored in the generated file
/// * `non_interactive` - Skip all prompts and write the defaults
/// * `force` - Overwrite an existing file without asking
pub fn run_init_wizard(config_path: &Path, language: &str, non_interactive: bool, force: bool) -> Result<()> {
    let theme = ColorfulTheme::default();

    if !non_interactive {
        println!("\n{}", t!("init_wizard_welcome", locale = language).cyan().bold());
        println!("{}", t!("init_wizard_description", locale = language));
    }

    if config_path.exists() && !force {
        if non_interactive {
            println!(
                "{}",
                t!("init_file_exists", locale = language, path = config_path.display()).red()
            );
            println!("{}", t!("init_use_force", locale = language).yellow());
            return Ok(());
        }
        let confirmation = Confirm::with_theme(&theme)
            .with_prompt(t!("init_overwrite_prompt", locale = language, path = config_path.display()))
            .default(false)
            .interact()
            .context(t!("init_user_confirmation_failed", locale = language).to_string())?;
        if !confirmation {
            println!("{}", t!("init_aborted", locale = language));
            return Ok(());
        }
    }

    let mut config = generate_default_config(language);

    if !non_interactive {
        config.test_binary = Input::with_theme(&theme)
            .with_prompt(t!("init_test_binary_prompt", locale = language))
            .default(DEFAULT_TEST_BINARY.to_string())
            .interact_text()
            .context(t!("init_user_confirmation_failed", locale = language).to_string())?;

        config.build_type = Input::with_theme(&theme)
            .with_prompt(t!("init_build_type_prompt", locale = language))
            .default("Debug".to_string())
            .interact_text()
            .context(t!("init_user_confirmation_failed", locale = language).to_string())?;

        let platform = Platform::current();
        let variant_index = Select::with_theme(&theme)
            .with_prompt(t!("init_variant_prompt", locale = language, os = platform.os_key()))
            .items(&Variant::ALL.map(Variant::as_str))
            .default(Variant::ALL.len() - 1)
            .interact()
            .context(t!("init_user_confirmation_failed", locale = language).to_string())?;
        let variant = Variant::ALL[variant_index];
        if variant != Variant::None {
            config
                .variant_defaults
                .insert(platform.os_key().to_string(), variant);
        }

        config.capture_output = Confirm::with_theme(&theme)
            .with_prompt(t!("init_capture_prompt", locale = language))
            .default(false)
            .interact()
            .context(t!("init_user_confirmation_failed", locale = language).to_string())?;
    }

    write_config(config_path, &config, language)
}

/// The config written by `init --non-interactive`.
pub fn generate_default_config(language: &str) -> HarnessConfig {
    let mut config = HarnessConfig::new(DEFAULT_TEST_BINARY);
    config.language = language.to_string();
    config
}

fn write_config(config_path: &Path, config: &HarnessConfig, language: &str) -> Result<()> {
    let body = toml::to_string_pretty(config)
        .context(t!("init_serialize_failed", locale = language).to_string())?;

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).with_context(|| {
                t!("init_create_parent_dir_failed", locale = language, path = parent.display())
            })?;
        }
    }

    fs::write(config_path, format!("{CONFIG_HEADER}{body}"))
        .with_context(|| t!("init_write_failed", locale = language, path = config_path.display()))?;

    println!(
        "{}",
        t!("init_success", locale = language, path = config_path.display()).green()
    );
    println!("{}", t!("init_next_steps", locale = language));
    Ok(())
}
