pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use chrono::NaiveDate;
#[cfg(feature = "cli")]
use clap::{Parser, ValueEnum};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "birthday-etl")]
#[command(about = "Daily birthday job: clean a contact list and notify today's birthdays")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "birthday-etl.toml")]
    pub config: String,

    /// Logical run date (YYYY-MM-DD) for backfills; defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Log notifications instead of delivering them
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    pub monitor: Option<bool>,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}
