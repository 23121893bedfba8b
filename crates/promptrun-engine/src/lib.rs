//! Prompt execution engine
//!
//! [`PromptExecutor`] drives one stored prompt through
//! `INIT -> LLM_CALL -> {DONE | TOOL_DISPATCH -> LLM_CALL}`, bounded by a
//! [`CallBudget`], optionally scored and wrapped in a validation gate that
//! re-runs whole attempts.

mod budget;
mod orchestrator;
mod request;

pub use budget::CallBudget;
pub use orchestrator::PromptExecutor;
pub use request::{
    EffectiveLimits, EngineSettings, ExecutionRequest, ExecutionResponse, PromptLimits,
};
