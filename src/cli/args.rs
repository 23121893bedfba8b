//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use promptrun_utils::logging::LogFormat;

/// promptrun - execute stored LLM prompts with parallel tool calling
#[derive(Debug, Parser)]
#[command(name = "promptrun", version)]
#[command(about = "Execute stored LLM prompts with parallel tool calling and validation gates")]
#[command(long_about = r#"
promptrun loads prompts and tool descriptors from a YAML library, fills their
templates, and drives the model through tool-calling rounds under call and time
budgets. Every attempt is appended to a JSON Lines execution log.

EXAMPLES:
  # Run a prompt with typed variables (values parse as JSON, else string)
  promptrun run support --var customer=Ada --var order_id=42

  # Emit the full response as JSON
  promptrun run support --var customer=Ada --json

  # List prompts in the library
  promptrun prompts

  # Show the effective configuration and where each value came from
  promptrun config --json
"#)]
pub struct Cli {
    /// Path to a config.toml (otherwise discovered upward from the cwd)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Prompt library YAML file
    #[arg(long, global = true, value_name = "PATH")]
    pub library: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log line layout on stderr: compact or json
    #[arg(long, global = true, default_value = "compact", value_name = "FORMAT")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Execute a stored prompt
    Run(RunArgs),

    /// List prompts in the library
    ///
    /// Run counts and mean response times combine the library file's values
    /// with the successful executions recorded in the execution log.
    Prompts {
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Whether errors should be reported as a JSON envelope on stdout.
    #[must_use]
    pub fn json(&self) -> bool {
        match self {
            Self::Run(args) => args.json,
            Self::Prompts { json } | Self::Config { json } => *json,
        }
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Prompt id in the library
    pub prompt_id: String,

    /// System variable as KEY=VALUE (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, Value)>,

    /// User variable as KEY=VALUE (repeatable)
    #[arg(long = "user-var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub user_vars: Vec<(String, Value)>,

    /// Literal user prompt; overrides the prompt's user template
    #[arg(long)]
    pub user_prompt: Option<String>,

    #[arg(long)]
    pub request_id: Option<String>,

    #[arg(long)]
    pub max_llm_calls: Option<u32>,

    #[arg(long)]
    pub max_tool_calls: Option<u32>,

    #[arg(long, value_name = "MS")]
    pub tool_timeout_ms: Option<u64>,

    /// Model override for this run
    #[arg(long)]
    pub model: Option<String>,

    /// Print the full response as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse `KEY=VALUE`. The value is read as JSON when it parses, otherwise
/// kept as a string, so `n=3` is a number and `name=Ada` a string.
///
/// # Errors
///
/// When `=` is missing or the key is empty.
pub fn parse_var(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
