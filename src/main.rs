//! microaudit - duplicate intelligence for survey microdata
//!
//! A CLI tool that loads a survey spreadsheet, flags duplicate participant
//! records by national ID and phone number, cleans the record set and
//! summarizes demographics by county.
//!
//! Exit codes:
//!   0 - Success (duplicate rate within --fail-above, or no threshold set)
//!   1 - Runtime error (source, missing column, config, export failure)
//!   2 - Duplicate rate above the --fail-above threshold

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod source;

use analysis::filter::{available_counties, date_span};
use analysis::{
    classify, clean, county_audit, county_duplicate_intelligence, summarize_demographics,
    CategoryCounts, CleaningOutcome, RecordFilter,
};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, PipelineConfig, CONFIG_FILE};
use models::{Record, Report, ReportMetadata, NO_COUNTY};
use report::{
    generate_json_report, generate_markdown_report, records_table, summary_tables,
    write_county_audit, write_csv, write_workbook, Table, WorkbookFileSink, WorksheetSink,
};
use source::{
    extract_records, ColumnMap, DataSource, DatasetCache, DatasetLoader, Fetcher, LoadedDataset,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // No logging needed to write a config file
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("microaudit v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_audit(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Audit failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: write a default configuration file.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the data source, column names and cleaning level.");
    Ok(())
}

fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete audit. Returns the exit code (0 or 2).
async fn run_audit(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Step 1: load the dataset
    let dataset = load_dataset(&config, &args).await?;
    if dataset.table.is_empty() {
        warn!("Dataset has no rows");
    }

    let columns = ColumnMap::resolve(&dataset.table, &config.columns)
        .context("Dataset does not have the expected columns")?;
    let records = extract_records(&dataset.table, &columns);

    if args.list_counties {
        return handle_list_counties(&records);
    }

    // Step 2: filter, classify, clean
    let filter = RecordFilter {
        from: args.from,
        to: args.to,
        counties: args.counties(),
    };
    let run = run_pipeline(&records, &filter, &config.pipeline);
    if run.filtered.is_empty() {
        warn!("No records matched the filters ({})", filter.describe());
    }

    // Step 3: aggregate
    println!("\n📊 Aggregating {} records...", run.filtered.len());
    let summary = CategoryCounts::from_records(&run.filtered);

    let audit = args.audit_county.as_deref().map(|county| {
        let audit = county_audit(&run.filtered, county);
        if audit.counts.total == 0 {
            warn!("County '{}' has no records after filtering", county);
        }
        audit
    });

    let metadata = ReportMetadata {
        source: dataset.source.clone(),
        generated_at: Utc::now(),
        fetched_at: dataset.fetched_at,
        from_cache: dataset.from_cache,
        rows_loaded: dataset.table.len(),
        rows_filtered: run.filtered.len(),
        undated_included: filter.undated_kept(&run.filtered),
        filters: filter.describe(),
        cleaning_level: config.pipeline.clean_level,
        blank_keys: config.pipeline.blank_keys,
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let report = Report {
        metadata,
        summary,
        reconciliation: summary.reconcile(),
        county_duplicates: county_duplicate_intelligence(&run.filtered),
        cleaning: run.cleaned.impact.clone(),
        demographics: summarize_demographics(&run.cleaned.records),
        audit,
    };

    if !report.reconciliation.balanced {
        warn!(
            "Category counts sum to {} for {} records",
            report.reconciliation.category_sum, report.reconciliation.total
        );
    }

    // Step 4: write the report and exports
    println!("\n📝 Writing report...");
    let cleaned_table = records_table(
        "Cleaned Data",
        "Cleaned Data",
        &dataset.table,
        &run.cleaned.records,
    );
    let written = write_outputs(&report, &dataset, &cleaned_table, &config)?;

    if let Some(ref path) = args.publish {
        let mut tables = vec![cleaned_table];
        tables.extend(summary_tables(&report));
        publish(&mut WorkbookFileSink::new(path), &tables);
    }

    print_summary(&report, &written, start_time.elapsed().as_secs_f64());

    if let Some(threshold) = args.fail_above {
        let rate = report.summary.duplicate_rate();
        if rate > threshold {
            eprintln!(
                "\n⛔ Duplicate rate {:.2}% is above {:.2}%. Failing (exit code 2).",
                rate, threshold
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Filtered, classified records and the cleaning result.
struct PipelineRun {
    filtered: Vec<Record>,
    cleaned: CleaningOutcome,
}

/// Filter, classify and clean one record set.
fn run_pipeline(records: &[Record], filter: &RecordFilter, settings: &PipelineConfig) -> PipelineRun {
    let mut filtered = filter.apply(records);
    debug!("{} of {} records pass the filters", filtered.len(), records.len());

    classify(&mut filtered, settings.blank_keys);
    let cleaned = clean(&filtered, settings.clean_level, settings.blank_keys);

    PipelineRun { filtered, cleaned }
}

/// Fetch the dataset, through the cache for remote sources.
async fn load_dataset(config: &Config, args: &Args) -> Result<LoadedDataset> {
    let source = DataSource::from_config(&config.source, !args.quiet)?;
    let remote = source.is_remote();

    println!("📥 Loading dataset: {}", source.describe());

    let mut loader = DatasetLoader::new(source);
    if remote && config.source.use_cache {
        let cache = DatasetCache::new(&config.source.cache_dir, config.source.cache_ttl_seconds);
        debug!("Dataset cache: {}", cache.dir().display());
        loader = loader.with_cache(cache);
    }

    if args.refresh {
        info!("Refreshing dataset cache");
        loader.invalidate_cache()?;
    }

    loader.load().await.context("Failed to load dataset")
}

/// Handle --list-counties: print counties and the date span, then exit.
fn handle_list_counties(records: &[Record]) -> Result<i32> {
    let counties = available_counties(records);

    println!("\n📍 Counties ({}):", counties.len());
    for county in &counties {
        let count = records
            .iter()
            .filter(|r| r.county.as_deref() == Some(county.as_str()))
            .count();
        println!("   {} ({} records)", county, count);
    }

    let missing = records.iter().filter(|r| r.county.is_none()).count();
    if missing > 0 {
        println!("   {} ({} records)", NO_COUNTY, missing);
    }

    match date_span(records) {
        Some((first, last)) => println!("\n📅 Dates: {} to {}", first, last),
        None => println!("\n📅 No parseable timestamps"),
    }

    Ok(0)
}

/// Write the report file and exports. Returns the paths written.
fn write_outputs(
    report: &Report,
    dataset: &LoadedDataset,
    cleaned_table: &Table,
    config: &Config,
) -> Result<Vec<PathBuf>> {
    let dir = &config.report.output_dir;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut written = Vec::new();

    let format = config.report.format;
    let report_path = dir.join(format!("report.{}", format.extension()));
    let content = match format {
        OutputFormat::Json => generate_json_report(report)?,
        OutputFormat::Markdown => {
            generate_markdown_report(report, config.report.audit_preview_rows)
        }
    };
    std::fs::write(&report_path, content)
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
    written.push(report_path);

    let csv_path = dir.join("cleaned_data.csv");
    write_csv(&csv_path, cleaned_table)
        .with_context(|| format!("Failed to write {}", csv_path.display()))?;
    written.push(csv_path);

    if !config.report.xlsx {
        debug!("Skipping workbooks");
        return Ok(written);
    }

    let summary_path = dir.join("summary.xlsx");
    write_workbook(&summary_path, &summary_tables(report))
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;
    written.push(summary_path);

    let cleaned_path = dir.join("cleaned_data.xlsx");
    write_workbook(&cleaned_path, std::slice::from_ref(cleaned_table))
        .with_context(|| format!("Failed to write {}", cleaned_path.display()))?;
    written.push(cleaned_path);

    if let Some(ref audit) = report.audit {
        if audit.counts.total > 0 {
            let files = write_county_audit(dir, &dataset.table, audit)
                .with_context(|| format!("Failed to write audit files for {}", audit.county))?;
            written.extend(files);
        }
    }

    Ok(written)
}

/// Write tables through a sink. Failures are reported, never fatal.
fn publish(sink: &mut impl WorksheetSink, tables: &[Table]) {
    let target = sink.describe();
    match sink.publish(tables) {
        Ok(count) => println!("\n📤 Published {} sheet(s) to {}", count, target),
        Err(e) => {
            warn!("Publishing to {} failed: {}", target, e);
            eprintln!("\n⚠️  Could not publish to {}: {}", target, e);
        }
    }
}

fn print_summary(report: &Report, written: &[PathBuf], duration: f64) {
    let counts = &report.summary;

    println!("\n📊 Duplicate Summary:");
    println!("   Records: {}", counts.total);
    println!(
        "   - Unique: {} | Exact: {} | Same ID: {} | Same Phone: {} | Complex: {}",
        counts.unique, counts.exact, counts.same_id, counts.same_phone, counts.complex
    );
    println!("   Duplicate rate: {:.2}%", counts.duplicate_rate());
    println!(
        "   After cleaning ({}): {} records",
        report.cleaning.level, report.cleaning.output
    );
    println!("   Duration: {:.1}s", duration);

    println!("\n✅ Audit complete! Files written:");
    for path in written {
        println!("   {}", path.display());
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::sample_records;
    use crate::models::{BlankKeyPolicy, CleaningLevel};
    use chrono::NaiveDate;

    #[test]
    fn test_pipeline_filters_before_classifying() {
        let settings = PipelineConfig {
            clean_level: CleaningLevel::Phone,
            blank_keys: BlankKeyPolicy::NoMatch,
        };

        let all = run_pipeline(&sample_records(), &RecordFilter::default(), &settings);
        assert_eq!(all.filtered.len(), 13);
        assert_eq!(all.cleaned.records.len(), 9);

        // Nairobi alone: row 2's ID twin lives in Kisumu, so it becomes unique
        let filter = RecordFilter {
            counties: vec!["Nairobi".to_string()],
            ..Default::default()
        };
        let nairobi = run_pipeline(&sample_records(), &filter, &settings);
        let counts = CategoryCounts::from_records(&nairobi.filtered);
        assert_eq!(counts.total, 3);
        assert_eq!(counts.exact, 2);
        assert_eq!(counts.unique, 1);
        assert_eq!(nairobi.cleaned.records.len(), 2);
    }

    #[test]
    fn test_pipeline_with_date_window() {
        let settings = PipelineConfig::default();
        let filter = RecordFilter {
            from: NaiveDate::from_ymd_opt(2024, 2, 1),
            to: NaiveDate::from_ymd_opt(2024, 2, 28),
            ..Default::default()
        };

        let run = run_pipeline(&sample_records(), &filter, &settings);
        let rows: Vec<usize> = run.filtered.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![6, 7, 8, 10, 11, 12]);
        assert!(CategoryCounts::from_records(&run.filtered).reconcile().balanced);
    }
}
