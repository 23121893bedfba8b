//! Prompt definitions, execution history sinks, and the YAML prompt library.

pub mod library;
pub mod prompt;
pub mod sink;

pub use library::PromptLibrary;
pub use prompt::{InMemoryPromptStore, PromptDefinition, PromptStats, PromptStore};
pub use sink::{
    ExecutionLogSink, FanoutLogSink, JsonlLogSink, MemoryLogSink, TracingLogSink,
    replay_execution_stats,
};
