#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{CliArgs, LogFormat};
pub use toml_config::{FilterConfig, NotionSettings, RunConfig};
