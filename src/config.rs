//! Configuration management for ramscope.
//!
//! This module handles loading, merging, and validating configuration from
//! files and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::catalog::MetricKind;
use crate::cli::{Args, ConfigFormat, ProfileArg};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default scheduler cadences
pub const DEFAULT_METRICS_INTERVAL_MS: u64 = 100;
pub const DEFAULT_DISCOVERY_INTERVAL_MS: u64 = 1_000;

/// Named poll-cadence presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Fast feedback: everything at 1s, expensive smaps metrics at 10s.
    Dev,
    /// Low overhead: 2s baseline, smaps metrics backed off to 15-30s.
    Production,
    /// Smooth curves for leak diagnosis: resident metrics at 2s, rest at 5s.
    LeakHunt,
}

impl Profile {
    pub fn intervals(self) -> PollIntervals {
        let secs = Duration::from_secs;
        match self {
            Profile::Dev => PollIntervals::uniform(secs(1))
                .with(MetricKind::Pss, secs(10))
                .with(MetricKind::Uss, secs(10))
                .with(MetricKind::PrivateBytes, secs(10)),
            Profile::Production => PollIntervals::uniform(secs(2))
                .with(MetricKind::PrivateBytes, secs(15))
                .with(MetricKind::Pss, secs(30))
                .with(MetricKind::Uss, secs(30)),
            Profile::LeakHunt => PollIntervals::uniform(secs(5))
                .with(MetricKind::Rss, secs(2))
                .with(MetricKind::WorkingSet, secs(2)),
        }
    }
}

impl From<ProfileArg> for Profile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Dev => Profile::Dev,
            ProfileArg::Production => Profile::Production,
            ProfileArg::LeakHunt => Profile::LeakHunt,
        }
    }
}

/// Per-metric poll cadences with a shared fallback.
#[derive(Debug, Clone)]
pub struct PollIntervals {
    default: Duration,
    overrides: AHashMap<MetricKind, Duration>,
}

impl PollIntervals {
    pub fn uniform(default: Duration) -> Self {
        Self {
            default,
            overrides: AHashMap::new(),
        }
    }

    fn with(mut self, kind: MetricKind, interval: Duration) -> Self {
        self.overrides.insert(kind, interval);
        self
    }

    pub fn for_kind(&self, kind: MetricKind) -> Duration {
        self.overrides.get(&kind).copied().unwrap_or(self.default)
    }

    pub fn set(&mut self, kind: MetricKind, interval: Duration) {
        self.overrides.insert(kind, interval);
    }
}

/// Effective configuration, merged from file and CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Poll-cadence profile
    pub profile: Option<Profile>,

    // Scheduler
    #[serde(alias = "metrics-interval-ms")]
    pub metrics_interval_ms: Option<u64>,
    #[serde(alias = "discovery-interval-ms")]
    pub discovery_interval_ms: Option<u64>,

    // Discovery filters
    #[serde(alias = "include-names")]
    pub include_names: Option<Vec<String>>,
    #[serde(alias = "exclude-names")]
    pub exclude_names: Option<Vec<String>>,
    #[serde(alias = "max-processes")]
    pub max_processes: Option<usize>,

    // Follow set at startup
    pub follow: Option<Vec<u32>>,
    #[serde(alias = "include-descendants")]
    pub include_descendants: Option<bool>,

    /// Metric kinds hidden in addition to the platform defaults
    #[serde(alias = "hidden-metrics")]
    pub hidden_metrics: Option<Vec<MetricKind>>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: Some(Profile::Dev),
            metrics_interval_ms: Some(DEFAULT_METRICS_INTERVAL_MS),
            discovery_interval_ms: Some(DEFAULT_DISCOVERY_INTERVAL_MS),
            include_names: None,
            exclude_names: None,
            max_processes: None,
            follow: None,
            include_descendants: Some(false),
            hidden_metrics: None,
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    pub fn effective_profile(&self) -> Profile {
        self.profile.unwrap_or(Profile::Dev)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms.unwrap_or(DEFAULT_METRICS_INTERVAL_MS))
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(
            self.discovery_interval_ms
                .unwrap_or(DEFAULT_DISCOVERY_INTERVAL_MS),
        )
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.metrics_interval_ms == Some(0) {
        return Err("metrics_interval_ms must be greater than zero".into());
    }
    if cfg.discovery_interval_ms == Some(0) {
        return Err("discovery_interval_ms must be greater than zero".into());
    }
    if cfg.max_processes == Some(0) {
        return Err("max_processes must be greater than zero".into());
    }
    if let Some(level) = cfg.log_level.as_deref() {
        const LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];
        if !LEVELS.contains(&level) {
            return Err(format!(
                "Invalid log_level '{level}', expected one of {LEVELS:?}"
            )
            .into());
        }
    }
    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?
    };

    if let Some(profile) = args.profile {
        config.profile = Some(profile.into());
    }
    if let Some(ms) = args.metrics_interval_ms {
        config.metrics_interval_ms = Some(ms);
    }
    if let Some(ms) = args.discovery_interval_ms {
        config.discovery_interval_ms = Some(ms);
    }
    if let Some(max) = args.max_processes {
        config.max_processes = Some(max);
    }
    if args.include_descendants {
        config.include_descendants = Some(true);
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(level.as_str().into());
    }

    // Parse comma-separated lists
    if let Some(include_str) = &args.include_names {
        config.include_names = Some(
            include_str
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
        );
    }
    if let Some(exclude_str) = &args.exclude_names {
        config.exclude_names = Some(
            exclude_str
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
        );
    }
    if let Some(follow_str) = &args.follow {
        let mut pids = Vec::new();
        for part in follow_str.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            pids.push(
                part.parse::<u32>()
                    .map_err(|_| format!("Invalid pid in --follow: '{part}'"))?,
            );
        }
        config.follow = Some(pids);
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/ramscope/ramscope.yaml",
            "/etc/ramscope/ramscope.yml",
            "/etc/ramscope/ramscope.json",
            "./ramscope.yaml",
            "./ramscope.yml",
            "./ramscope.json",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(""))
    };

    if !path.exists() || path.to_string_lossy().is_empty() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_intervals() {
        let dev = Profile::Dev.intervals();
        assert_eq!(dev.for_kind(MetricKind::Rss), Duration::from_secs(1));
        assert_eq!(dev.for_kind(MetricKind::Pss), Duration::from_secs(10));
        assert_eq!(dev.for_kind(MetricKind::HeapUsed), Duration::from_secs(1));

        let prod = Profile::Production.intervals();
        assert_eq!(prod.for_kind(MetricKind::Uss), Duration::from_secs(30));
        assert_eq!(
            prod.for_kind(MetricKind::PrivateBytes),
            Duration::from_secs(15)
        );

        let hunt = Profile::LeakHunt.intervals();
        assert_eq!(hunt.for_kind(MetricKind::Rss), Duration::from_secs(2));
        assert_eq!(hunt.for_kind(MetricKind::HeapUsed), Duration::from_secs(5));
    }

    #[test]
    fn test_poll_interval_override() {
        let mut intervals = PollIntervals::uniform(Duration::from_secs(1));
        intervals.set(MetricKind::Pss, Duration::from_secs(7));
        assert_eq!(intervals.for_kind(MetricKind::Pss), Duration::from_secs(7));
        assert_eq!(intervals.for_kind(MetricKind::Rss), Duration::from_secs(1));
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut cfg = Config::default();
        assert!(validate_effective_config(&cfg).is_ok());
        cfg.metrics_interval_ms = Some(0);
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_log_level() {
        let mut cfg = Config::default();
        cfg.log_level = Some("verbose".into());
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_resolve_cli_overrides_defaults() {
        let args = Args {
            no_config: true,
            follow: Some("10, 20".into()),
            include_descendants: true,
            metrics_interval_ms: Some(250),
            include_names: Some("java,python".into()),
            ..Default::default()
        };
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.follow, Some(vec![10, 20]));
        assert_eq!(cfg.include_descendants, Some(true));
        assert_eq!(cfg.metrics_interval_ms, Some(250));
        assert_eq!(
            cfg.include_names,
            Some(vec!["java".to_string(), "python".to_string()])
        );
        // Untouched fields keep defaults.
        assert_eq!(cfg.discovery_interval_ms, Some(DEFAULT_DISCOVERY_INTERVAL_MS));
    }

    #[test]
    fn test_resolve_rejects_non_numeric_pid() {
        let args = Args {
            no_config: true,
            follow: Some("10,abc".into()),
            ..Default::default()
        };
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn test_yaml_round_trip_with_kebab_aliases() {
        let yaml = "profile: leak-hunt\nmetrics-interval-ms: 200\nhidden-metrics:\n  - pss\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.profile, Some(Profile::LeakHunt));
        assert_eq!(cfg.metrics_interval_ms, Some(200));
        assert_eq!(cfg.hidden_metrics, Some(vec![MetricKind::Pss]));
    }
}
