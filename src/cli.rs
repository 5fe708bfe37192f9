//! CLI arguments for ramscope.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug, Default)]
#[command(
    name = "ramscope",
    about = "Per-process memory telemetry with bounded history",
    long_about = "Per-process memory telemetry with bounded history.\n\n\
                  Follows selected processes (optionally with their descendants) and \
                  samples RSS, PSS, USS and managed-runtime heap metrics on independent \
                  poll cadences, keeping an exact rolling window per series.",
    version,
    propagate_version = true
)]
pub struct Args {
    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Log level
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Poll-cadence profile
    #[arg(long, value_enum)]
    pub profile: Option<ProfileArg>,

    /// PIDs to follow at startup (comma-separated)
    #[arg(long)]
    pub follow: Option<String>,

    /// Also monitor descendants of followed processes
    #[arg(long)]
    pub include_descendants: bool,

    /// Collection tick interval in milliseconds
    #[arg(long)]
    pub metrics_interval_ms: Option<u64>,

    /// Process discovery interval in milliseconds
    #[arg(long)]
    pub discovery_interval_ms: Option<u64>,

    /// Include only processes matching these names (comma-separated)
    #[arg(long)]
    pub include_names: Option<String>,

    /// Exclude processes matching these names (comma-separated)
    #[arg(long)]
    pub exclude_names: Option<String>,

    /// Maximum number of processes to list during discovery
    #[arg(long)]
    pub max_processes: Option<usize>,
}

/// Poll-cadence profile for CLI parsing. Mirrors [`crate::config::Profile`].
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProfileArg {
    Dev,
    Production,
    LeakHunt,
}
