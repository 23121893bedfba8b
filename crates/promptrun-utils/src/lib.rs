//! Foundation utilities shared by every promptrun crate.
//!
//! Holds the conversation and execution-log data model, the trace context that
//! is threaded through LLM and tool calls, the error taxonomy, exit-code and
//! status mapping, logging setup, and error-message redaction.

pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod redaction;
pub mod trace;
pub mod types;
