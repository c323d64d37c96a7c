pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::{CliArgs, LogFormat};

pub use crate::adapters::notion::NotionClient;
pub use crate::config::RunConfig;
pub use crate::core::engine::{RollupEngine, RunSummary};
pub use crate::core::handler::{
    HandlerFactory, ProcessorConfig, ProcessorConfigSpec, PropertyHandler,
};
pub use crate::core::processor::{ProcessorFactory, PropertyProcessor};
pub use crate::utils::error::{Result, RollupError};
