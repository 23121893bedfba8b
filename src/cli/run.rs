//! CLI entry point and dispatch
//!
//! `run()` parses arguments, discovers configuration, installs tracing, builds
//! the tokio runtime, dispatches to a command, and owns all error output.

use clap::Parser;

use promptrun_config::{CliArgs, Config};
use promptrun_utils::error::{PromptRunError, UserFriendlyError};
use promptrun_utils::exit_codes::ExitCode;
use promptrun_utils::logging::init_tracing;
use promptrun_utils::redaction::redact_error_message;

use super::args::{Cli, Commands};
use super::commands;

/// Main CLI execution function.
///
/// Prints everything itself, errors included, and returns the exit code for
/// `main` to pass to `std::process::exit`.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose, cli.log_format) {
        eprintln!("warning: logging unavailable: {e}");
    }

    let mut cli_args = CliArgs {
        config_path: cli.config.clone(),
        // Relative to the cwd, not the config file.
        library: cli
            .library
            .clone()
            .map(|path| std::path::absolute(&path).unwrap_or(path)),
        ..CliArgs::default()
    };
    if let Commands::Run(args) = &cli.command {
        cli_args.max_llm_calls = args.max_llm_calls;
        cli_args.max_tool_calls = args.max_tool_calls;
        cli_args.tool_timeout_ms = args.tool_timeout_ms;
        cli_args.model = args.model.clone();
    }

    let json = cli.command.json();

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => return Err(report(&PromptRunError::Config(err), json)),
    };
    tracing::debug!(
        config_file = ?config.config_path,
        library = %config.library_path().display(),
        "Configuration loaded"
    );

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let result = rt.block_on(async {
        match cli.command {
            Commands::Run(args) => commands::execute_run_command(args, &config).await,
            Commands::Prompts { json } => commands::execute_prompts_command(&config, json),
            Commands::Config { json } => commands::execute_config_command(&config, json),
        }
    });

    result.map_err(|error| match error.downcast_ref::<PromptRunError>() {
        Some(err) => report(err, json),
        None => {
            eprintln!("✗ {}", redact_error_message(&format!("{error:#}")));
            ExitCode::INTERNAL
        }
    })
}

/// Print `err` and map it to an exit code.
///
/// With `json` the error envelope goes to stdout so scripted callers can read
/// it; otherwise a contextual report goes to stderr.
fn report(err: &PromptRunError, json: bool) -> ExitCode {
    let mut envelope = err.to_envelope();
    envelope.message = redact_error_message(&envelope.message);

    if json {
        match serde_json::to_string_pretty(&envelope) {
            Ok(text) => println!("{text}"),
            Err(_) => eprintln!("✗ {}", envelope.message),
        }
    } else {
        eprintln!("✗ [{}] {}", err.category(), envelope.message);
        if let Some(context) = err.context() {
            eprintln!("  {}", redact_error_message(&context));
        }
        let suggestions = err.suggestions();
        if !suggestions.is_empty() {
            eprintln!();
            eprintln!("Suggestions:");
            for suggestion in suggestions {
                eprintln!("  - {suggestion}");
            }
        }
    }

    err.to_exit_code()
}
