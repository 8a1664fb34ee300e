//! Date range and county filters.
//!
//! Filtering keeps the relative order of records, which the cleaning
//! stage relies on to decide which occurrence is "first".

use crate::models::Record;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Active record filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    /// Inclusive lower date bound.
    pub from: Option<NaiveDate>,
    /// Inclusive upper date bound.
    pub to: Option<NaiveDate>,
    /// Counties to keep; empty keeps all.
    pub counties: Vec<String>,
}

impl RecordFilter {
    /// Returns true if any date bound is set.
    pub fn has_date_bounds(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// Check a single record against the filter.
    ///
    /// With a date bound set, records without a timestamp are excluded.
    pub fn matches(&self, record: &Record) -> bool {
        if self.has_date_bounds() {
            let Some(date) = record.timestamp.map(|ts| ts.date()) else {
                return false;
            };
            if self.from.is_some_and(|from| date < from) {
                return false;
            }
            if self.to.is_some_and(|to| date > to) {
                return false;
            }
        }

        if !self.counties.is_empty() {
            let Some(ref county) = record.county else {
                return false;
            };
            if !self.counties.iter().any(|c| c == county) {
                return false;
            }
        }

        true
    }

    /// Apply the filter, preserving input order.
    pub fn apply(&self, records: &[Record]) -> Vec<Record> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }

    /// Records in an already-filtered set that passed without a timestamp.
    ///
    /// Always zero when a date bound is set, since those records are dropped.
    pub fn undated_kept(&self, filtered: &[Record]) -> usize {
        if self.has_date_bounds() {
            return 0;
        }
        filtered.iter().filter(|r| r.timestamp.is_none()).count()
    }

    /// Human-readable summary for report metadata.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();

        match (self.from, self.to) {
            (Some(from), Some(to)) => parts.push(format!("dates {} to {}", from, to)),
            (Some(from), None) => parts.push(format!("dates from {}", from)),
            (None, Some(to)) => parts.push(format!("dates up to {}", to)),
            (None, None) => {}
        }

        if !self.counties.is_empty() {
            parts.push(format!("counties: {}", self.counties.join(", ")));
        }

        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join("; ")
        }
    }
}

/// Distinct counties, sorted.
pub fn available_counties(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.county.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Earliest and latest timestamp dates, if any record has one.
pub fn date_span(records: &[Record]) -> Option<(NaiveDate, NaiveDate)> {
    let mut dates = records.iter().filter_map(|r| r.timestamp.map(|ts| ts.date()));
    let first = dates.next()?;
    Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
}
