//! Error types for the data source and export layers.

use thiserror::Error;

/// Failures while obtaining or parsing the survey dataset.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No data source configured (use --sheet, --url or --file)")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

/// Failures while writing report files or worksheets.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Cannot read workbook: {0}")]
    Read(#[from] calamine::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
