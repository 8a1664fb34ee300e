//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.microaudit.toml` files.

use crate::cli::{Args, OutputFormat};
use crate::models::{BlankKeyPolicy, CleaningLevel};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".microaudit.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Column names in the survey sheet.
    #[serde(default)]
    pub columns: ColumnConfig,

    /// Classification and cleaning settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Where the dataset comes from and how long it is cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Spreadsheet identifier, used to build the CSV export URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<String>,

    /// Explicit CSV (or spreadsheet share) URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Local CSV file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Directory holding the cached dataset.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Cache time-to-live in seconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,

    /// Serve the dataset from the cache when it is fresh.
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            sheet_id: None,
            url: None,
            file: None,
            cache_dir: default_cache_dir(),
            cache_ttl_seconds: default_cache_ttl(),
            use_cache: true,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".microaudit-cache")
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

/// Column headers, matched literally after trimming whitespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default = "default_id_column")]
    pub national_id: String,

    #[serde(default = "default_phone_column")]
    pub phone: String,

    #[serde(default = "default_county_column")]
    pub county: String,

    #[serde(default = "default_gender_column")]
    pub gender: String,

    #[serde(default = "default_age_column")]
    pub age: String,

    #[serde(default = "default_disability_column")]
    pub disability: String,

    /// Timestamp candidates; the first one present is used.
    #[serde(default = "default_timestamp_columns")]
    pub timestamp: Vec<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            national_id: default_id_column(),
            phone: default_phone_column(),
            county: default_county_column(),
            gender: default_gender_column(),
            age: default_age_column(),
            disability: default_disability_column(),
            timestamp: default_timestamp_columns(),
        }
    }
}

fn default_id_column() -> String {
    "WHAT IS YOUR NATIONAL ID?".to_string()
}

fn default_phone_column() -> String {
    "Business phone number".to_string()
}

fn default_county_column() -> String {
    "Business Location".to_string()
}

fn default_gender_column() -> String {
    "Gender".to_string()
}

fn default_age_column() -> String {
    "Age".to_string()
}

fn default_disability_column() -> String {
    "Do you have any disability?".to_string()
}

fn default_timestamp_columns() -> Vec<String> {
    vec!["Timestamp".to_string(), "Training date".to_string()]
}

/// Classification and cleaning settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Deduplication strictness applied before aggregation.
    #[serde(default)]
    pub clean_level: CleaningLevel,

    /// How blank IDs and phone numbers are matched.
    #[serde(default)]
    pub blank_keys: BlankKeyPolicy,
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory all report files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Write `.xlsx` workbooks next to the report.
    #[serde(default = "default_true")]
    pub xlsx: bool,

    /// Maximum record rows shown per table in the county audit section.
    #[serde(default = "default_preview_rows")]
    pub audit_preview_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            format: OutputFormat::default(),
            xlsx: true,
            audit_preview_rows: default_preview_rows(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("microaudit_report")
}

fn default_preview_rows() -> usize {
    500
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence, but only when explicitly provided.
    pub fn merge_with_args(&mut self, args: &Args) {
        // Any explicit source on the command line replaces all configured ones
        if args.sheet.is_some() || args.url.is_some() || args.file.is_some() {
            self.source.sheet_id = args.sheet.clone();
            self.source.url = args.url.clone();
            self.source.file = args.file.clone();
        }

        if let Some(ttl) = args.cache_ttl {
            self.source.cache_ttl_seconds = ttl;
        }
        if args.no_cache {
            self.source.use_cache = false;
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }

        if let Some(level) = args.clean_level {
            self.pipeline.clean_level = level;
        }
        if let Some(policy) = args.blank_keys {
            self.pipeline.blank_keys = policy;
        }

        if let Some(ref dir) = args.output_dir {
            self.report.output_dir = dir.clone();
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }
        if args.no_xlsx {
            self.report.xlsx = false;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.columns.national_id, "WHAT IS YOUR NATIONAL ID?");
        assert_eq!(config.source.cache_ttl_seconds, 300);
        assert_eq!(config.pipeline.clean_level, CleaningLevel::Exact);
        assert_eq!(config.pipeline.blank_keys, BlankKeyPolicy::NoMatch);
        assert!(config.report.xlsx);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[source]
sheet_id = "abc123"
cache_ttl_seconds = 60

[columns]
county = "County"
timestamp = ["Submitted"]

[pipeline]
clean_level = "phone"
blank_keys = "literal"

[report]
format = "json"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.source.sheet_id.as_deref(), Some("abc123"));
        assert_eq!(config.source.cache_ttl_seconds, 60);
        assert!(config.source.use_cache);
        assert_eq!(config.columns.county, "County");
        assert_eq!(config.columns.phone, "Business phone number");
        assert_eq!(config.columns.timestamp, vec!["Submitted"]);
        assert_eq!(config.pipeline.clean_level, CleaningLevel::Phone);
        assert_eq!(config.pipeline.blank_keys, BlankKeyPolicy::Literal);
        assert_eq!(config.report.format, OutputFormat::Json);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[source]"));
        assert!(toml_str.contains("[columns]"));
        assert!(toml_str.contains("[pipeline]"));
        assert!(toml_str.contains("[report]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.columns.timestamp.len(), 2);
    }

    #[test]
    fn test_merge_only_explicit_args() {
        let mut config = Config::default();
        config.source.sheet_id = Some("from-file".to_string());
        config.pipeline.clean_level = CleaningLevel::Id;

        let args = Args::parse_from(["microaudit", "--no-xlsx"]);
        config.merge_with_args(&args);

        assert_eq!(config.source.sheet_id.as_deref(), Some("from-file"));
        assert_eq!(config.pipeline.clean_level, CleaningLevel::Id);
        assert!(!config.report.xlsx);

        let args = Args::parse_from([
            "microaudit",
            "--file",
            "survey.csv",
            "--clean-level",
            "none",
        ]);
        config.merge_with_args(&args);

        assert!(config.source.sheet_id.is_none());
        assert_eq!(config.source.file, Some(PathBuf::from("survey.csv")));
        assert_eq!(config.pipeline.clean_level, CleaningLevel::None);
    }
}
