//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{BlankKeyPolicy, CleaningLevel};
use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// microaudit - duplicate intelligence for survey microdata
///
/// Loads a survey spreadsheet, flags duplicate participants by national ID
/// and phone number, cleans the record set and summarizes demographics by
/// county. Markdown/JSON reports and Excel exports.
///
/// Examples:
///   microaudit --sheet 1LDPRGnR5jlz...
///   microaudit --file survey.csv --clean-level phone --county Nairobi,Kisumu
///   microaudit --file survey.csv --from 2024-01-01 --to 2024-03-31 --format json
///   microaudit --file survey.csv --audit-county Nakuru
///   microaudit --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Spreadsheet identifier; the sheet is read through its CSV export URL
    #[arg(long, value_name = "ID", env = "MICROAUDIT_SHEET_ID", conflicts_with_all = ["url", "file"])]
    pub sheet: Option<String>,

    /// CSV URL (a spreadsheet share URL is rewritten to its CSV export)
    #[arg(long, value_name = "URL", env = "MICROAUDIT_URL", conflicts_with = "file")]
    pub url: Option<String>,

    /// Local CSV file
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .microaudit.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Keep records on or after this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Keep records on or before this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub to: Option<NaiveDate>,

    /// Counties to include (comma-separated); all when omitted
    ///
    /// Example: --county Nairobi,Kisumu
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub county: Option<Vec<String>>,

    /// Deduplication strictness applied before demographic summaries
    #[arg(long, value_name = "LEVEL")]
    pub clean_level: Option<CleaningLevel>,

    /// How blank IDs and phone numbers are matched
    #[arg(long, value_name = "POLICY")]
    pub blank_keys: Option<BlankKeyPolicy>,

    /// County to audit at record level
    #[arg(long, value_name = "NAME")]
    pub audit_county: Option<String>,

    /// Directory for the report and exports
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Skip writing .xlsx workbooks
    #[arg(long)]
    pub no_xlsx: bool,

    /// Also write cleaned data and summary sheets into this workbook,
    /// replacing sheets of the same name
    #[arg(long, value_name = "FILE")]
    pub publish: Option<PathBuf>,

    /// Discard the cached dataset and fetch it again
    #[arg(long)]
    pub refresh: bool,

    /// Do not read or write the dataset cache
    #[arg(long, conflicts_with = "refresh")]
    pub no_cache: bool,

    /// Cache time-to-live in seconds
    #[arg(long, value_name = "SECS")]
    pub cache_ttl: Option<u64>,

    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Exit with code 2 when the duplicate rate exceeds this percentage
    ///
    /// Useful for scheduled data-quality checks.
    #[arg(long, value_name = "PERCENT")]
    pub fail_above: Option<f64>,

    /// List the counties and the date span in the dataset, then exit
    #[arg(long)]
    pub list_counties: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .microaudit.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// File extension for the report file.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref file) = self.file {
            if !file.is_file() {
                return Err(format!("Input file does not exist: {}", file.display()));
            }
        }

        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(format!("--from ({}) is after --to ({})", from, to));
            }
        }

        if let Some(rate) = self.fail_above {
            if !(0.0..=100.0).contains(&rate) {
                return Err("--fail-above must be between 0 and 100".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Selected counties, trimmed, with empty entries dropped.
    pub fn counties(&self) -> Vec<String> {
        self.county
            .iter()
            .flatten()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut full = vec!["microaudit"];
        full.extend_from_slice(args);
        Args::parse_from(full)
    }

    #[test]
    fn test_parse_filters() {
        let args = parse(&[
            "--from",
            "2024-01-01",
            "--to",
            "2024-02-01",
            "--county",
            "Nairobi, Kisumu",
            "--clean-level",
            "id",
            "--blank-keys",
            "literal",
        ]);

        assert_eq!(args.from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(args.counties(), vec!["Nairobi", "Kisumu"]);
        assert_eq!(args.clean_level, Some(CleaningLevel::Id));
        assert_eq!(args.blank_keys, Some(BlankKeyPolicy::Literal));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let args = parse(&["--url", "ftp://example.com/data.csv"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_date_order() {
        let args = parse(&["--from", "2024-05-01", "--to", "2024-01-01"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let args = parse(&["--verbose", "--quiet"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_fail_above_range() {
        let args = parse(&["--fail-above", "140"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = parse(&[]);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
