//! Configuration Module
//!
//! Provides TOML-based configuration for flowrank.
//! Configuration is optional - CLI arguments can override file settings.

use std::num::NonZeroUsize;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::export::OutputFormat;
use crate::filter::FilterSpec;
use crate::settings::{Settings, SortKey};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub report: ReportConfig,
    pub filters: FilterSpec,
    pub output: OutputConfig,
    pub watch: WatchConfig,
}

impl Config {
    /// Loads configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Loads the given file, or returns defaults when no file is given.
    /// A file that is given but unreadable or invalid is an error.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Generates a default configuration file content
    pub fn generate_default() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| "# Failed to generate config".to_string())
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.report.cache_slots == 0 {
            anyhow::bail!("cache_slots must be greater than 0");
        }
        if self.watch.interval_secs == 0 {
            anyhow::bail!("interval_secs must be greater than 0");
        }
        if self.watch.extension.is_empty() {
            anyhow::bail!("watch extension must not be empty");
        }
        Ok(())
    }

    /// Query settings described by the `[report]` and `[filters]` sections.
    pub fn settings(&self) -> Settings {
        Settings {
            sort_key: self.report.sort_key,
            threshold: self.report.threshold,
            filters: self.filters.clone(),
        }
    }

    /// Cache capacity, falling back to a single slot.
    pub fn cache_slots(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.report.cache_slots).unwrap_or(NonZeroUsize::MIN)
    }
}

/// Ranking configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Metric to rank by
    pub sort_key: SortKey,
    /// Minimum metric value for a row to be reported
    pub threshold: u64,
    /// Number of (settings -> report) results kept between ingestions
    pub cache_slots: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            sort_key: SortKey::Sessions,
            threshold: 0,
            cache_slots: 1,
        }
    }
}

/// Output-related configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format (text, json, jsonl)
    #[serde(with = "output_format_serde")]
    pub format: OutputFormat,
    /// Enable verbose logging
    pub verbose: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            verbose: false,
        }
    }
}

/// Directory watch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Seconds between directory scans
    pub interval_secs: u64,
    /// File extension of batch files
    pub extension: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            extension: "json".to_string(),
        }
    }
}

/// Custom serde implementation for OutputFormat
mod output_format_serde {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(format: &OutputFormat, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OutputFormat, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterName;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.report.sort_key, SortKey::Sessions);
        assert_eq!(config.report.threshold, 0);
        assert_eq!(config.cache_slots().get(), 1);
        assert!(config.filters.is_empty());
        assert_eq!(config.watch.interval_secs, 10);
        assert_eq!(config.watch.extension, "json");
    }

    #[test]
    fn test_config_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.report.cache_slots = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.watch.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_generate_default_config() {
        let config_str = Config::generate_default();
        assert!(config_str.contains("[report]"));
        assert!(config_str.contains("[output]"));
        assert!(config_str.contains("[watch]"));
        assert!(config_str.contains("sort_key = \"sessions\""));

        let parsed: Config = toml::from_str(&config_str).unwrap();
        assert_eq!(parsed.report.sort_key, SortKey::Sessions);
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[report]
sort_key = "all-octets"
threshold = 1000
cache_slots = 4

[filters]
local-ip = "10.0.0.0/8"
destination-port = "443,8443"

[output]
format = "jsonl"

[watch]
interval_secs = 30
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.report.sort_key, SortKey::AllOctets);
        assert_eq!(config.cache_slots().get(), 4);
        assert_eq!(config.output.format, OutputFormat::JsonLines);
        assert_eq!(config.watch.interval_secs, 30);
        assert_eq!(config.watch.extension, "json");

        let settings = config.settings();
        assert_eq!(settings.threshold, 1000);
        assert_eq!(settings.filters.get(FilterName::LocalIp), Some("10.0.0.0/8"));
        assert_eq!(settings.filters.get(FilterName::DestinationPort), Some("443,8443"));
    }

    #[test]
    fn test_unknown_names_rejected() {
        assert!(toml::from_str::<Config>("[report]\nsort_key = \"bogus\"\n").is_err());
        assert!(toml::from_str::<Config>("[filters]\nvlan = \"12\"\n").is_err());
    }

    #[test]
    fn test_load_rejects_unknown_filter_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[filters]\nvlan = \"12\"").unwrap();
        assert!(Config::load_optional(Some(file.path())).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[report]\ncache_slots = 0").unwrap();

        assert!(Config::load(file.path()).is_err());
        assert!(Config::load_optional(Some(file.path())).is_err());
        assert_eq!(Config::load_optional(None).unwrap().cache_slots().get(), 1);
    }
}
