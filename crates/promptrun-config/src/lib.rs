//! Configuration model, discovery, and validation for promptrun.
//!
//! Values are resolved with precedence CLI > `.promptrun/config.toml` >
//! built-in defaults, and each resolved key carries its [`ConfigSource`].

mod builder;
mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use discovery::PROMPTRUN_HOME_ENV;
pub use model::*;
pub use promptrun_utils::types::ConfigSource;
