// src/cli.rs
use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf, process::ExitCode, time::Duration};

use crate::core::config::Variant;
use crate::infra::t;

pub mod commands;

/// Environment variable selecting the build variant when `--variant` is absent.
pub const VARIANT_ENV: &str = "HARNESS_VARIANT";
/// Environment variable carrying the test filter when `--filter` is absent.
pub const FILTER_ENV: &str = "TEST";

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` argument.
fn pre_parse_language() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    let pos = args.iter().position(|arg| arg == "--lang")?;
    args.get(pos + 1).cloned()
}

fn build_cli(locale: &str) -> Command {
    Command::new("harness-runner")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli_about", locale = locale).to_string())
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about(t!("cmd_run_about", locale = locale).to_string())
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help(t!("arg_config", locale = locale).to_string())
                        .value_name("CONFIG")
                        .default_value("Harness.toml")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("variant")
                        .long("variant")
                        .help(t!("arg_variant", locale = locale).to_string())
                        .value_name("VARIANT")
                        .value_parser(clap::value_parser!(Variant))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("filter")
                        .long("filter")
                        .help(t!("arg_filter", locale = locale).to_string())
                        .value_name("FILTER")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("build-dir")
                        .long("build-dir")
                        .help(t!("arg_build_dir", locale = locale).to_string())
                        .value_name("BUILD_DIR")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help(t!("arg_jobs", locale = locale).to_string())
                        .value_name("JOBS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("test-timeout")
                        .long("test-timeout")
                        .help(t!("arg_test_timeout", locale = locale).to_string())
                        .value_name("SECONDS")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("capture")
                        .long("capture")
                        .help(t!("arg_capture", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help(t!("arg_dry_run", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help(t!("arg_html", locale = locale).to_string())
                        .value_name("HTML")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help(t!("arg_json", locale = locale).to_string())
                        .value_name("JSON")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cmd_init_about", locale = locale).to_string())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help(t!("arg_output", locale = locale).to_string())
                        .value_name("OUTPUT")
                        .default_value("Harness.toml")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("non-interactive")
                        .long("non-interactive")
                        .help(t!("arg_non_interactive", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help(t!("arg_force", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
}

/// Parses the command line, dispatches the subcommand and returns the
/// process exit status.
pub async fn run() -> Result<ExitCode> {
    // Pre-parse language and initialize i18n first.
    let explicit_language = pre_parse_language();
    let language = explicit_language
        .clone()
        .unwrap_or_else(crate::detect_locale);
    rust_i18n::set_locale(&language);

    let matches = build_cli(&language).get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            let args = run_args(run_matches, explicit_language)?;
            commands::run::execute(args).await
        }
        Some(("init", init_matches)) => {
            let output = init_matches
                .get_one::<PathBuf>("output")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("Harness.toml"));
            let non_interactive = init_matches.get_flag("non-interactive");
            let force = init_matches.get_flag("force");

            if explicit_language.is_none() && !non_interactive {
                println!(
                    "{}",
                    t!("system_language_detected", locale = &language, lang = &language)
                );
            }
            commands::init::run_init_wizard(&output, &language, non_interactive, force)?;
            Ok(ExitCode::SUCCESS)
        }
        // `subcommand_required` makes clap print help and exit before we get here.
        _ => Ok(ExitCode::FAILURE),
    }
}

/// Collects the `run` arguments, falling back to the environment for the
/// variant and the test filter. The environment is read here and nowhere else.
fn run_args(matches: &ArgMatches, lang: Option<String>) -> Result<commands::run::RunArgs> {
    let variant = match matches.get_one::<Variant>("variant") {
        Some(v) => Some(*v),
        None => env::var(VARIANT_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.parse::<Variant>())
            .transpose()
            .with_context(|| t!("cli.bad_variant_env", var = VARIANT_ENV))?,
    };

    let filter = matches
        .get_one::<String>("filter")
        .cloned()
        .or_else(|| env::var(FILTER_ENV).ok())
        .filter(|f| !f.trim().is_empty());

    let build_dir = matches
        .get_one::<PathBuf>("build-dir")
        .map(std::path::absolute)
        .transpose()
        .context(t!("cli.bad_build_dir"))?;

    Ok(commands::run::RunArgs {
        config: matches
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from("Harness.toml")),
        lang,
        variant,
        filter,
        build_dir,
        jobs: matches.get_one::<usize>("jobs").copied(),
        test_timeout: matches
            .get_one::<u64>("test-timeout")
            .map(|secs| Duration::from_secs(*secs)),
        capture: matches.get_flag("capture"),
        dry_run: matches.get_flag("dry-run"),
        html: matches.get_one::<PathBuf>("html").cloned(),
        json: matches.get_one::<PathBuf>("json").cloned(),
    })
}
