//! Tabular views of the aggregates.
//!
//! Every summary that ends up in the Markdown report or in a workbook is
//! first turned into a [`Table`], so both renderers share one layout.

use crate::analysis::{
    CategoryCounts, CleaningImpact, CountyDuplicateRow, CountyShare, CrossTab, Indicator,
};
use crate::models::{DuplicateCategory, Record, Report};
use crate::source::RawTable;
use serde::Serialize;
use std::fmt;

/// A single typed cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Count(usize),
    /// Percentages and other fractional values.
    Number(f64),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Count(n) => write!(f, "{}", n),
            Cell::Number(v) => write!(f, "{:.2}", v),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<usize> for Cell {
    fn from(n: usize) -> Self {
        Cell::Count(n)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

/// A titled table with a worksheet name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub title: String,
    /// Worksheet name used when the table is exported.
    pub sheet: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(title: impl Into<String>, sheet: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            title: title.into(),
            sheet: sheet.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as a GitHub-flavoured Markdown table, at most `limit` rows.
    pub fn to_markdown(&self, limit: usize) -> String {
        let mut out = String::new();

        out.push_str(&format!("| {} |\n", join_escaped(self.headers.iter())));
        out.push_str(&format!(
            "|{}\n",
            self.headers
                .iter()
                .enumerate()
                .map(|(i, _)| if i == 0 { ":---|" } else { "---:|" })
                .collect::<String>()
        ));

        for row in self.rows.iter().take(limit) {
            out.push_str(&format!("| {} |\n", join_escaped(row.iter())));
        }

        if self.rows.len() > limit {
            out.push_str(&format!(
                "\n*Showing {} of {} rows.*\n",
                limit,
                self.rows.len()
            ));
        }

        out
    }
}

fn join_escaped<T: fmt::Display>(cells: impl Iterator<Item = T>) -> String {
    cells
        .map(|c| c.to_string().replace('|', "\\|").replace('\n', " "))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Executive summary: one line per category plus totals.
pub fn summary_table(counts: &CategoryCounts) -> Table {
    let mut table = Table::new("Executive Summary", "Summary", headers(&["Metric", "Value"]));

    table.push_row(vec!["Total Records".into(), counts.total.into()]);
    for category in DuplicateCategory::ALL {
        table.push_row(vec![category.to_string().into(), counts.get(category).into()]);
    }
    table.push_row(vec!["Total Duplicates".into(), counts.duplicates().into()]);
    table.push_row(vec!["Duplicate Rate (%)".into(), counts.duplicate_rate().into()]);

    table
}

pub fn county_duplicates_table(rows: &[CountyDuplicateRow]) -> Table {
    let mut table = Table::new(
        "County Duplicate Intelligence",
        "County Duplicates",
        headers(&[
            "County",
            "Total",
            "Exact",
            "SameID_DiffPhone",
            "SamePhone_DiffID",
            "Complex",
            "Total_Duplicates",
            "Duplicate_Rate_%",
        ]),
    );

    for row in rows {
        table.push_row(vec![
            row.county.as_str().into(),
            row.counts.total.into(),
            row.counts.exact.into(),
            row.counts.same_id.into(),
            row.counts.same_phone.into(),
            row.counts.complex.into(),
            row.total_duplicates.into(),
            row.duplicate_rate.into(),
        ]);
    }

    table
}

/// Cleaning ledger, one line per stage and a closing total.
pub fn cleaning_table(impact: &CleaningImpact) -> Table {
    let mut table = Table::new(
        "Cleaning Impact",
        "Cleaning Impact",
        headers(&["Stage", "Before", "Removed", "After"]),
    );

    for stage in &impact.stages {
        table.push_row(vec![
            stage.level.to_string().into(),
            stage.before.into(),
            stage.removed.into(),
            stage.after.into(),
        ]);
    }
    table.push_row(vec![
        "Total".into(),
        impact.input.into(),
        impact.removed().into(),
        impact.output.into(),
    ]);

    table
}

pub fn distribution_table(shares: &[CountyShare]) -> Table {
    let mut table = Table::new(
        "County Distribution",
        "County Distribution",
        headers(&["County", "Records", "Share (%)"]),
    );

    for share in shares {
        table.push_row(vec![
            share.county.as_str().into(),
            share.count.into(),
            share.percent.into(),
        ]);
    }

    table
}

/// Cross tabulation with a total column and a total row.
pub fn crosstab_table(tab: &CrossTab) -> Table {
    let mut names = vec!["County".to_string()];
    names.extend(tab.columns.iter().cloned());
    names.push("Total".to_string());

    let mut table = Table::new(
        format!("County by {}", tab.dimension),
        format!("County x {}", tab.dimension),
        names,
    );

    for row in &tab.rows {
        let mut cells: Vec<Cell> = vec![row.county.as_str().into()];
        cells.extend(row.counts.iter().map(|&n| Cell::Count(n)));
        cells.push(row.total.into());
        table.push_row(cells);
    }

    let mut totals: Vec<Cell> = vec!["Total".into()];
    totals.extend(tab.totals.iter().map(|&n| Cell::Count(n)));
    totals.push(tab.grand_total.into());
    table.push_row(totals);

    table
}

pub fn indicators_table(indicators: &[Indicator]) -> Table {
    let mut table = Table::new("Indicators", "Indicators", headers(&["Indicator", "Value"]));
    for indicator in indicators {
        table.push_row(vec![indicator.name.as_str().into(), indicator.value.into()]);
    }
    table
}

/// Every summary table of a report, in presentation order.
pub fn summary_tables(report: &Report) -> Vec<Table> {
    let demographics = &report.demographics;
    vec![
        summary_table(&report.summary),
        county_duplicates_table(&report.county_duplicates),
        cleaning_table(&report.cleaning),
        distribution_table(&demographics.county_distribution),
        crosstab_table(&demographics.by_gender),
        crosstab_table(&demographics.by_age_group),
        crosstab_table(&demographics.by_disability),
        indicators_table(&demographics.indicators),
    ]
}

/// Columns appended to the source columns in record-level exports.
pub const DERIVED_COLUMNS: [&str; 3] = ["Age Group", "Disability Status", "Duplicate Category"];

/// Record-level table: the original row values followed by derived labels.
pub fn records_table<'a>(
    title: impl Into<String>,
    sheet: impl Into<String>,
    raw: &RawTable,
    records: impl IntoIterator<Item = &'a Record>,
) -> Table {
    let mut names = raw.headers.clone();
    names.extend(DERIVED_COLUMNS.iter().map(|s| s.to_string()));

    let mut table = Table::new(title, sheet, names);
    let width = raw.headers.len();

    for record in records {
        let source = raw.rows.get(record.row).map(Vec::as_slice).unwrap_or(&[]);
        let mut cells: Vec<Cell> = (0..width)
            .map(|i| Cell::Text(source.get(i).cloned().unwrap_or_default()))
            .collect();
        cells.push(record.age_group.to_string().into());
        cells.push(record.disability.to_string().into());
        cells.push(record.category.to_string().into());
        table.push_row(cells);
    }

    table
}

/// Compact record view for the Markdown audit preview.
pub fn record_preview_table<'a>(
    title: impl Into<String>,
    records: impl IntoIterator<Item = &'a Record>,
) -> Table {
    let mut table = Table::new(
        title,
        "Preview",
        headers(&[
            "Row",
            "National ID",
            "Phone",
            "Gender",
            "Age Group",
            "Disability",
            "Category",
        ]),
    );

    for record in records {
        table.push_row(vec![
            // 1-based to match spreadsheet data rows
            (record.row + 1).into(),
            record.national_id.as_str().into(),
            record.phone_number.as_str().into(),
            record.gender.to_string().into(),
            record.age_group.to_string().into(),
            record.disability.to_string().into(),
            record.category.to_string().into(),
        ]);
    }

    table
}
