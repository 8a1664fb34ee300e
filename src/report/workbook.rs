//! Spreadsheet and CSV exports.
//!
//! Tables are written one per worksheet. Files are assembled in memory and
//! moved into place, so a failed export never leaves a half-written file.

use super::table::{records_table, Cell, Table};
use crate::analysis::CountyAudit;
use crate::error::ExportError;
use crate::models::DuplicateCategory;
use crate::source::RawTable;
use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Longest worksheet name Excel accepts.
pub const MAX_SHEET_NAME: usize = 31;

const FORBIDDEN_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Make `name` a legal worksheet name.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !FORBIDDEN_SHEET_CHARS.contains(c) && !c.is_control())
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'').trim();
    let truncated: String = cleaned.chars().take(MAX_SHEET_NAME).collect();

    if truncated.is_empty() {
        "Sheet".to_string()
    } else {
        truncated
    }
}

/// Sanitized name not yet in `used` (compared case-insensitively).
fn unique_sheet_name(name: &str, used: &mut HashSet<String>) -> String {
    let base = sanitize_sheet_name(name);
    let mut candidate = base.clone();
    let mut n = 2;

    while used.contains(&candidate.to_lowercase()) {
        let suffix = format!(" ({})", n);
        let keep = MAX_SHEET_NAME - suffix.chars().count();
        candidate = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
        n += 1;
    }

    used.insert(candidate.to_lowercase());
    candidate
}

/// Turn a county or other label into a file name component.
pub fn file_component(name: &str) -> String {
    let component: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if component.is_empty() {
        "unnamed".to_string()
    } else {
        component
    }
}

fn write_table(sheet: &mut Worksheet, table: &Table, header: &Format) -> Result<(), XlsxError> {
    for (col, name) in table.headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, name, header)?;
    }

    for (i, row) in table.rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match cell {
                Cell::Text(s) if s.is_empty() => {}
                Cell::Text(s) => {
                    sheet.write_string(r, c, s)?;
                }
                Cell::Count(n) => {
                    sheet.write_number(r, c, *n as f64)?;
                }
                Cell::Number(v) => {
                    sheet.write_number(r, c, *v)?;
                }
            }
        }
    }

    if !table.headers.is_empty() {
        sheet.set_freeze_panes(1, 0)?;
    }
    sheet.autofit();
    Ok(())
}

/// Build an in-memory workbook with one sheet per table.
fn build_workbook(tables: &[Table]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let mut used = HashSet::new();

    for table in tables {
        let name = unique_sheet_name(&table.sheet, &mut used);
        let sheet = workbook.add_worksheet();
        sheet.set_name(&name)?;
        write_table(sheet, table, &header)?;
    }

    if tables.is_empty() {
        workbook.add_worksheet();
    }

    Ok(workbook.save_to_buffer()?)
}

fn save_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| ExportError::Io(e.error))?;
    Ok(())
}

/// Write `tables` to an `.xlsx` file, one worksheet each.
pub fn write_workbook(path: &Path, tables: &[Table]) -> Result<(), ExportError> {
    let bytes = build_workbook(tables)?;
    save_atomic(path, &bytes)?;
    debug!("Wrote {} sheet(s) to {}", tables.len().max(1), path.display());
    Ok(())
}

/// Write a table as CSV. Numbers keep full precision.
pub fn write_csv(path: &Path, table: &Table) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.headers)?;

    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| match cell {
            Cell::Number(v) => v.to_string(),
            other => other.to_string(),
        }))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    save_atomic(path, &bytes)
}

/// Write the record-level files of a county audit into `dir`.
///
/// Produces `RAW_<county>.xlsx` with every record of the county, then one
/// file per duplicate category. Returns the paths written.
pub fn write_county_audit(
    dir: &Path,
    raw: &RawTable,
    audit: &CountyAudit,
) -> Result<Vec<PathBuf>, ExportError> {
    let county = file_component(&audit.county);
    let mut written = Vec::new();

    let path = dir.join(format!("RAW_{}.xlsx", county));
    let table = records_table(
        format!("{} raw data", audit.county),
        &audit.county,
        raw,
        &audit.records,
    );
    write_workbook(&path, &[table])?;
    written.push(path);

    for category in DuplicateCategory::ALL.into_iter().filter(|c| c.is_duplicate()) {
        let path = dir.join(format!("{}_{}.xlsx", category.file_prefix(), county));
        let table = records_table(
            category.to_string(),
            category.file_prefix(),
            raw,
            audit.subset(category),
        );
        write_workbook(&path, &[table])?;
        written.push(path);
    }

    info!("Wrote {} audit files for {}", written.len(), audit.county);
    Ok(written)
}

/// Destination that accepts named worksheets.
pub trait WorksheetSink {
    /// Human-readable target, for messages.
    fn describe(&self) -> String;

    /// Write every table as a worksheet named by [`Table::sheet`],
    /// replacing sheets of the same name. Returns the sheets written.
    fn publish(&mut self, tables: &[Table]) -> Result<usize, ExportError>;
}

/// A local `.xlsx` file acting as a shared workbook.
///
/// Sheets that are not republished are carried over as plain values.
#[derive(Debug, Clone)]
pub struct WorkbookFileSink {
    path: PathBuf,
}

impl WorkbookFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WorksheetSink for WorkbookFileSink {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn publish(&mut self, tables: &[Table]) -> Result<usize, ExportError> {
        let replaced: HashSet<String> = tables
            .iter()
            .map(|t| sanitize_sheet_name(&t.sheet).to_lowercase())
            .collect();

        let existing = if self.path.exists() {
            read_sheets(&self.path)?
        } else {
            Vec::new()
        };

        let mut merged: Vec<Table> = existing
            .into_iter()
            .filter(|t| !replaced.contains(&t.sheet.to_lowercase()))
            .collect();
        debug!("Keeping {} existing sheet(s)", merged.len());
        merged.extend(tables.iter().cloned());

        write_workbook(&self.path, &merged)?;
        Ok(tables.len())
    }
}

/// Read every worksheet of an `.xlsx` file. The first row becomes the header.
pub fn read_sheets(path: &Path) -> Result<Vec<Table>, ExportError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let mut tables = Vec::new();

    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        let mut rows = range.rows();

        let headers: Vec<String> = rows
            .next()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .unwrap_or_default();

        let mut table = Table::new(name.clone(), name, headers);
        for row in rows {
            table.push_row(row.iter().map(read_cell).collect());
        }
        tables.push(table);
    }

    Ok(tables)
}

fn read_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Text(String::new()),
        Data::Float(v) => Cell::Number(*v),
        Data::Int(v) if *v >= 0 => Cell::Count(*v as usize),
        Data::Int(v) => Cell::Number(*v as f64),
        other => Cell::Text(other.to_string()),
    }
}
