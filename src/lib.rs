//! promptrun - prompt execution engine with parallel tool calling
//!
//! promptrun executes stored LLM prompts. A prompt carries system and user
//! templates with typed variables, default model settings, and the tools,
//! activities, and workflows the model may call. One execution fills the
//! templates, drives the model through tool-calling rounds (each round's calls
//! run concurrently under a per-call timeout), enforces call and wall-clock
//! budgets, optionally scores the final answer, and appends an execution log
//! entry per attempt.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! promptrun run support --var customer=Ada --json
//! promptrun prompts
//! promptrun config
//! ```
//!
//! # Quick Start (Library)
//!
//! ```no_run
//! use promptrun::{Config, ExecutionRequest, app};
//!
//! # async fn demo() -> Result<(), promptrun::PromptRunError> {
//! let config = Config::builder().build()?;
//! let executor = app::build_executor(&config)?;
//! let response = executor
//!     .execute(ExecutionRequest::new("support").system_var("customer", "Ada".into()))
//!     .await?;
//! println!("{}", response.response.content);
//! # Ok(())
//! # }
//! ```
//!
//! # Crates
//!
//! | Crate | Role |
//! |-------|------|
//! | `promptrun-utils` | data model, errors, trace context, logging |
//! | `promptrun-prompt-template` | variable validation and `${name}` interpolation |
//! | `promptrun-config` | TOML discovery with source attribution |
//! | `promptrun-llm` | `LlmClient` trait and OpenAI-compatible provider |
//! | `promptrun-catalog` | tool/activity/workflow descriptors and resolution |
//! | `promptrun-store` | prompt store, YAML library, execution log sinks |
//! | `promptrun-dispatch` | parallel tool dispatch |
//! | `promptrun-validation` | LLM-graded response scoring |
//! | `promptrun-engine` | the execution state machine |

pub mod app;
pub mod cli;

pub use promptrun_catalog as catalog;
pub use promptrun_config as config;
pub use promptrun_dispatch as dispatch;
pub use promptrun_engine as engine;
pub use promptrun_llm as llm;
pub use promptrun_prompt_template as prompt_template;
pub use promptrun_store as store;
pub use promptrun_utils as utils;
pub use promptrun_validation as validation;

pub use promptrun_config::{CliArgs, Config};
pub use promptrun_engine::{
    CallBudget, EngineSettings, ExecutionRequest, ExecutionResponse, PromptExecutor, PromptLimits,
};
pub use promptrun_utils::error::PromptRunError;
pub use promptrun_utils::exit_codes::ExitCode;
pub use promptrun_utils::trace::TraceContext;
