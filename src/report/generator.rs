//! Markdown and JSON report generation.
//!
//! The Markdown report follows the order of the audit: metadata, duplicate
//! summary, per-county duplicate intelligence, cleaning impact, demographics
//! of the cleaned data and, when requested, a record-level county audit.

use super::table::{
    cleaning_table, county_duplicates_table, crosstab_table, distribution_table,
    indicators_table, record_preview_table, summary_table,
};
use crate::analysis::{CountyAudit, DemographicSummary, Reconciliation};
use crate::error::ExportError;
use crate::models::{BlankKeyPolicy, DuplicateCategory, Report, ReportMetadata};

/// Generate a complete Markdown report.
///
/// `preview_rows` caps each record table of the county audit section.
pub fn generate_markdown_report(report: &Report, preview_rows: usize) -> String {
    let mut output = String::new();

    output.push_str("# Microdata Audit Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report));
    output.push_str(&generate_summary_section(report));
    output.push_str(&generate_county_section(report));
    output.push_str(&generate_cleaning_section(report));
    output.push_str(&generate_demographics_section(&report.demographics));

    if let Some(ref audit) = report.audit {
        output.push_str(&generate_audit_section(audit, preview_rows));
    }

    output.push_str(&generate_footer(&report.metadata));

    output
}

fn blank_key_label(policy: BlankKeyPolicy) -> &'static str {
    match policy {
        BlankKeyPolicy::Literal => "blank values match each other",
        BlankKeyPolicy::NoMatch => {
            "blank IDs and phones never match (not literal matching, where blanks match each other; use --blank-keys literal for that)"
        }
    }
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Data Fetched:** {}{}\n",
        metadata.fetched_at.format("%Y-%m-%d %H:%M:%S UTC"),
        if metadata.from_cache { " (cached)" } else { "" }
    ));
    section.push_str(&format!("- **Rows Loaded:** {}\n", metadata.rows_loaded));
    section.push_str(&format!(
        "- **Rows After Filters:** {}\n",
        metadata.rows_filtered
    ));
    section.push_str(&format!("- **Filters:** {}\n", metadata.filters));
    if metadata.undated_included > 0 {
        section.push_str(&format!(
            "- **Undated Rows:** {} rows without a timestamp included (no date bounds set)\n",
            metadata.undated_included
        ));
    }
    section.push_str(&format!(
        "- **Cleaning Level:** {}\n",
        metadata.cleaning_level
    ));
    section.push_str(&format!(
        "- **Blank Keys:** {}\n",
        blank_key_label(metadata.blank_keys)
    ));
    section.push_str(&format!(
        "- **Run Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_table_of_contents(report: &Report) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Executive Summary](#executive-summary)\n");
    toc.push_str("- [County Duplicate Intelligence](#county-duplicate-intelligence)\n");
    toc.push_str("- [Cleaning Impact](#cleaning-impact)\n");
    toc.push_str("- [Demographics](#demographics)\n");

    if let Some(ref audit) = report.audit {
        let heading = format!("County Deep Audit: {}", audit.county);
        toc.push_str(&format!("- [{}](#{})\n", heading, heading_anchor(&heading)));
    }

    toc.push('\n');
    toc
}

/// Anchor a Markdown renderer assigns to a heading: lowercase, punctuation
/// dropped, spaces turned into hyphens.
fn heading_anchor(heading: &str) -> String {
    heading
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .map(|c| if c == ' ' { '-' } else { c })
        .collect()
}

fn reconciliation_line(check: &Reconciliation) -> String {
    if check.balanced {
        format!(
            "✅ Reconciled: the five categories account for all {} records.\n\n",
            check.total
        )
    } else {
        format!(
            "⚠️ Reconciliation mismatch: categories sum to {} but {} records were classified.\n\n",
            check.category_sum, check.total
        )
    }
}

fn generate_summary_section(report: &Report) -> String {
    let mut section = String::new();
    let counts = &report.summary;

    section.push_str("## Executive Summary\n\n");

    if counts.total == 0 {
        section.push_str("No records matched the active filters.\n\n");
        return section;
    }

    section.push_str(&format!(
        "**{}** of **{}** records ({:.2}%) share a national ID or phone number with another record.\n\n",
        counts.duplicates(),
        counts.total,
        counts.duplicate_rate()
    ));
    section.push_str(&summary_table(counts).to_markdown(usize::MAX));
    section.push('\n');
    section.push_str(&reconciliation_line(&report.reconciliation));

    section
}

fn generate_county_section(report: &Report) -> String {
    let mut section = String::new();

    section.push_str("## County Duplicate Intelligence\n\n");

    if report.county_duplicates.is_empty() {
        section.push_str("No county data available.\n\n");
        return section;
    }

    section.push_str("Counties ordered by duplicate rate, highest first.\n\n");
    section.push_str(&county_duplicates_table(&report.county_duplicates).to_markdown(usize::MAX));
    section.push('\n');

    section
}

fn generate_cleaning_section(report: &Report) -> String {
    let mut section = String::new();
    let impact = &report.cleaning;

    section.push_str("## Cleaning Impact\n\n");

    if impact.stages.is_empty() {
        section.push_str(&format!(
            "{}: all {} records kept.\n\n",
            impact.level, impact.input
        ));
        return section;
    }

    section.push_str(&format!(
        "{} removed **{}** of {} records ({:.2}%), leaving **{}**.\n\n",
        impact.level,
        impact.removed(),
        impact.input,
        impact.removed_percent(),
        impact.output
    ));
    section.push_str(&cleaning_table(impact).to_markdown(usize::MAX));
    section.push('\n');

    section
}

fn generate_demographics_section(demographics: &DemographicSummary) -> String {
    let mut section = String::new();

    section.push_str("## Demographics\n\n");
    section.push_str(&format!(
        "Computed on the {} records remaining after cleaning.\n\n",
        demographics.total
    ));

    if demographics.total == 0 {
        return section;
    }

    let tables = [
        distribution_table(&demographics.county_distribution),
        crosstab_table(&demographics.by_gender),
        crosstab_table(&demographics.by_age_group),
        crosstab_table(&demographics.by_disability),
        indicators_table(&demographics.indicators),
    ];

    for table in &tables {
        section.push_str(&format!("### {}\n\n", table.title));
        section.push_str(&table.to_markdown(usize::MAX));
        section.push('\n');
    }

    section
}

fn generate_audit_section(audit: &CountyAudit, preview_rows: usize) -> String {
    let mut section = String::new();

    section.push_str(&format!("## County Deep Audit: {}\n\n", audit.county));

    if audit.counts.total == 0 {
        section.push_str("No records found for this county.\n\n");
        return section;
    }

    section.push_str(&summary_table(&audit.counts).to_markdown(usize::MAX));
    section.push('\n');

    for category in DuplicateCategory::ALL.into_iter().filter(|c| c.is_duplicate()) {
        let subset = audit.subset(category);
        if subset.is_empty() {
            continue;
        }

        let table = record_preview_table(category.to_string(), subset);
        section.push_str(&format!("### {} ({})\n\n", table.title, table.len()));
        section.push_str(&table.to_markdown(preview_rows));
        section.push('\n');
    }

    section
}

fn generate_footer(metadata: &ReportMetadata) -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated on: **{}** by microaudit v{}*\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::sample_records;
    use crate::analysis::{
        classify, clean, county_audit, county_duplicate_intelligence, summarize_demographics,
        CategoryCounts,
    };
    use crate::models::CleaningLevel;
    use chrono::Utc;

    fn create_test_report(audit_county: Option<&str>) -> Report {
        let mut records = sample_records();
        classify(&mut records, BlankKeyPolicy::NoMatch);
        let summary = CategoryCounts::from_records(&records);
        let outcome = clean(&records, CleaningLevel::Exact, BlankKeyPolicy::NoMatch);

        Report {
            metadata: ReportMetadata {
                source: "fixtures/survey_sample.csv".to_string(),
                generated_at: Utc::now(),
                fetched_at: Utc::now(),
                from_cache: true,
                rows_loaded: 13,
                rows_filtered: 13,
                undated_included: 1,
                filters: "none".to_string(),
                cleaning_level: CleaningLevel::Exact,
                blank_keys: BlankKeyPolicy::NoMatch,
                duration_seconds: 0.4,
            },
            reconciliation: summary.reconcile(),
            summary,
            county_duplicates: county_duplicate_intelligence(&records),
            cleaning: outcome.impact,
            demographics: summarize_demographics(&outcome.records),
            audit: audit_county.map(|c| county_audit(&records, c)),
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report(None);
        let markdown = generate_markdown_report(&report, 10);

        assert!(markdown.contains("# Microdata Audit Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Executive Summary"));
        assert!(markdown.contains("## County Duplicate Intelligence"));
        assert!(markdown.contains("## Cleaning Impact"));
        assert!(markdown.contains("### County by Age Group"));
        assert!(markdown.contains("**9** of **13** records (69.23%)"));
        assert!(markdown.contains("✅ Reconciled"));
        assert!(markdown.contains("Report generated on:"));
        assert!(!markdown.contains("County Deep Audit"));
    }

    #[test]
    fn test_generate_metadata_section() {
        let report = create_test_report(None);
        let section = generate_metadata_section(&report.metadata);

        assert!(section.contains("fixtures/survey_sample.csv"));
        assert!(section.contains("(cached)"));
        assert!(section.contains("Level 1 (exact ID + phone)"));
        assert!(section.contains("blank IDs and phones never match"));
        assert!(section.contains("not literal matching"));
        assert!(section.contains("--blank-keys literal"));
        assert!(section
            .contains("- **Undated Rows:** 1 rows without a timestamp included (no date bounds set)"));
    }

    #[test]
    fn test_metadata_omits_undated_line_when_none_kept() {
        let mut report = create_test_report(None);
        report.metadata.undated_included = 0;
        report.metadata.blank_keys = BlankKeyPolicy::Literal;
        let section = generate_metadata_section(&report.metadata);

        assert!(!section.contains("Undated Rows"));
        assert!(section.contains("blank values match each other"));
    }

    #[test]
    fn test_audit_section_with_preview_limit() {
        let report = create_test_report(Some("Kisumu"));
        let markdown = generate_markdown_report(&report, 1);

        assert!(markdown.contains("## County Deep Audit: Kisumu"));
        assert!(markdown.contains("(#county-deep-audit-kisumu)"));
        assert!(markdown.contains("### Same Phone, Different ID (2)"));
        assert!(markdown.contains("Showing 1 of 2 rows"));
        assert!(!markdown.contains("### Complex Duplicate"));
    }

    #[test]
    fn test_heading_anchor_drops_punctuation() {
        assert_eq!(
            heading_anchor("County Deep Audit: (No county)"),
            "county-deep-audit-no-county"
        );
        assert_eq!(
            heading_anchor("County Deep Audit: Taita-Taveta"),
            "county-deep-audit-taita-taveta"
        );

        let report = create_test_report(Some("(No county)"));
        let markdown = generate_markdown_report(&report, 10);
        assert!(markdown.contains("(#county-deep-audit-no-county)"));
        assert!(markdown.contains("## County Deep Audit: (No county)"));
    }

    #[test]
    fn test_unbalanced_reconciliation_is_flagged() {
        let check = Reconciliation {
            total: 10,
            category_sum: 9,
            balanced: false,
        };
        assert!(reconciliation_line(&check).contains("mismatch"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report(Some("Nakuru"));
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"county_duplicates\""));
        assert!(json.contains("\"indicators\""));
        assert!(json.contains("\"audit\""));
        assert!(json.contains("\"blank_keys\": \"no-match\""));
    }
}
