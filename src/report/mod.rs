//! Report rendering and file exports.

pub mod generator;
pub mod table;
pub mod workbook;

pub use generator::{generate_json_report, generate_markdown_report};
pub use table::{records_table, summary_tables, Table};
pub use workbook::{
    write_county_audit, write_csv, write_workbook, WorkbookFileSink, WorksheetSink,
};
