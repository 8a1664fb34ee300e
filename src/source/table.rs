//! CSV parsing and record extraction.
//!
//! The loaded sheet is kept as a [`RawTable`] so record-level exports can
//! reproduce every original column, while [`Record`]s carry only the
//! fields the pipeline needs.

use crate::config::ColumnConfig;
use crate::error::SourceError;
use crate::models::{AgeGroup, DisabilityStatus, Gender, Record};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

/// Datetime layouts tried in order. Month-first wins over day-first.
const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%b-%Y"];

/// The sheet as loaded: trimmed headers and string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    /// Every row has exactly `headers.len()` cells.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Index of a header, matched literally.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name.trim())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse CSV text into a table.
///
/// Ragged rows are padded or truncated to the header width.
pub fn parse_csv(text: &str) -> Result<RawTable, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}').to_string())
        .collect();

    let width = headers.len();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    debug!("Parsed {} rows x {} columns", rows.len(), width);

    Ok(RawTable { headers, rows })
}

/// Resolved column positions for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub national_id: usize,
    pub phone: usize,
    pub county: usize,
    pub gender: Option<usize>,
    pub age: Option<usize>,
    pub disability: Option<usize>,
    pub timestamp: Option<usize>,
}

impl ColumnMap {
    /// Locate the configured columns in the table.
    ///
    /// ID, phone and county are required. The rest degrade to placeholder
    /// values when absent.
    pub fn resolve(table: &RawTable, columns: &ColumnConfig) -> Result<Self, SourceError> {
        let required = |name: &str| {
            table
                .column(name)
                .ok_or_else(|| SourceError::MissingColumn(name.trim().to_string()))
        };
        let optional = |name: &str| {
            let index = table.column(name);
            if index.is_none() {
                warn!("Column '{}' not found; values will be unspecified", name);
            }
            index
        };

        let timestamp = columns
            .timestamp
            .iter()
            .find_map(|name| table.column(name));
        match timestamp {
            Some(index) => debug!("Using '{}' as timestamp", table.headers[index]),
            None => warn!(
                "No timestamp column found (tried {:?}); date filters will drop all rows",
                columns.timestamp
            ),
        }

        Ok(Self {
            national_id: required(&columns.national_id)?,
            phone: required(&columns.phone)?,
            county: required(&columns.county)?,
            gender: optional(&columns.gender),
            age: optional(&columns.age),
            disability: optional(&columns.disability),
            timestamp,
        })
    }
}

/// Build one record per table row, in table order.
pub fn extract_records(table: &RawTable, map: &ColumnMap) -> Vec<Record> {
    table
        .rows
        .iter()
        .enumerate()
        .map(|(row, cells)| {
            let cell = |index: usize| cells[index].trim();
            let optional_cell = |index: Option<usize>| {
                index.map(|i| cells[i].trim()).filter(|v| !v.is_empty())
            };

            let county = Some(cell(map.county))
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            let age = optional_cell(map.age).and_then(parse_age);

            Record {
                row,
                national_id: cell(map.national_id).to_string(),
                phone_number: cell(map.phone).to_string(),
                county,
                gender: optional_cell(map.gender)
                    .map(Gender::from)
                    .unwrap_or(Gender::Unspecified),
                age,
                age_group: AgeGroup::from_age(age),
                disability: DisabilityStatus::from_response(optional_cell(map.disability)),
                timestamp: optional_cell(map.timestamp).and_then(parse_timestamp),
                category: Default::default(),
            }
        })
        .collect()
}

/// Parse a timestamp, returning `None` for anything unrecognised.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Parse an age; non-numeric and non-finite values become `None`.
pub fn parse_age(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|age| age.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const SAMPLE: &str = include_str!("../../fixtures/survey_sample.csv");

    #[test]
    fn test_parse_csv_trims_headers() {
        let table = parse_csv("\u{feff} Name ,Age  \nAda,36\nBob\n").unwrap();
        assert_eq!(table.headers, vec!["Name", "Age"]);
        assert_eq!(table.rows[1], vec!["Bob".to_string(), String::new()]);
        assert_eq!(table.column(" Age"), Some(1));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let dt = parse_timestamp("1/15/2024 10:23:45").unwrap();
        assert_eq!((dt.month(), dt.day(), dt.hour()), (1, 15, 10));

        let dt = parse_timestamp("2024-03-02").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 2));

        assert!(parse_timestamp("2024-03-02T08:00:00+03:00").is_some());
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_parse_age() {
        assert_eq!(parse_age(" 35 "), Some(35.0));
        assert_eq!(parse_age("29.5"), Some(29.5));
        assert_eq!(parse_age("thirty"), None);
        assert_eq!(parse_age("NaN"), None);
    }

    #[test]
    fn test_missing_required_column() {
        let table = parse_csv("Timestamp,Business Location\n1/1/2024,Nairobi\n").unwrap();
        let err = ColumnMap::resolve(&table, &ColumnConfig::default()).unwrap_err();
        assert!(matches!(err, SourceError::MissingColumn(ref c) if c == "WHAT IS YOUR NATIONAL ID?"));
    }

    #[test]
    fn test_fallback_timestamp_and_missing_disability() {
        let csv = "Training date,WHAT IS YOUR NATIONAL ID?,Business phone number,Business Location\n\
                   2024-02-10,111,0700,Nakuru\n";
        let table = parse_csv(csv).unwrap();
        let map = ColumnMap::resolve(&table, &ColumnConfig::default()).unwrap();
        assert_eq!(map.timestamp, Some(0));
        assert_eq!(map.disability, None);

        let records = extract_records(&table, &map);
        assert_eq!(records[0].disability, DisabilityStatus::Unspecified);
        assert_eq!(records[0].age_group, AgeGroup::Unknown);
        assert!(records[0].timestamp.is_some());
    }

    #[test]
    fn test_extract_sample_records() {
        let table = parse_csv(SAMPLE).unwrap();
        let map = ColumnMap::resolve(&table, &ColumnConfig::default()).unwrap();
        let records = extract_records(&table, &map);

        assert_eq!(records.len(), table.len());
        assert!(records.iter().enumerate().all(|(i, r)| r.row == i));

        let first = &records[0];
        assert_eq!(first.national_id, "12345678");
        assert_eq!(first.county.as_deref(), Some("Nairobi"));
        assert_eq!(first.gender, Gender::Female);
        assert_eq!(first.age_group, AgeGroup::Youth);

        // Row with a malformed timestamp and a non-numeric age
        let bad = &records[9];
        assert!(bad.timestamp.is_none());
        assert_eq!(bad.age, None);
    }
}
