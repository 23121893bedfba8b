use std::path::PathBuf;

/// Configuration overrides supplied on the command line.
///
/// Every field is optional; `None` leaves the config file or default value in
/// place.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub library: Option<PathBuf>,
    pub max_llm_calls: Option<u32>,
    pub max_tool_calls: Option<u32>,
    pub tool_timeout_ms: Option<u64>,
    pub model: Option<String>,
}
