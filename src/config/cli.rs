use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "notion-rollup")]
#[command(about = "Aggregate Notion database columns into target rows")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "configs/default.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Query and aggregate, but do not update any page
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// List processor types and named handlers, then exit
    #[arg(long)]
    pub list: bool,
}
