//! Record aggregation and statistics.
//!
//! Duplicate statistics are computed on the filtered, classified records.
//! Demographic summaries are computed on the cleaned records. Records
//! without a county are grouped under [`crate::models::NO_COUNTY`] so that every
//! partition adds up to the record count.

use crate::models::{AgeGroup, DisabilityStatus, DuplicateCategory, Gender, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Counts per duplicate category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub total: usize,
    pub unique: usize,
    pub exact: usize,
    pub same_id: usize,
    pub same_phone: usize,
    pub complex: usize,
}

impl CategoryCounts {
    /// Count categories over classified records.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut counts = Self::default();

        for record in records {
            counts.total += 1;
            match record.category {
                DuplicateCategory::Unique => counts.unique += 1,
                DuplicateCategory::ExactDuplicate => counts.exact += 1,
                DuplicateCategory::SameIdDifferentPhone => counts.same_id += 1,
                DuplicateCategory::SamePhoneDifferentId => counts.same_phone += 1,
                DuplicateCategory::ComplexDuplicate => counts.complex += 1,
            }
        }

        counts
    }

    pub fn get(&self, category: DuplicateCategory) -> usize {
        match category {
            DuplicateCategory::Unique => self.unique,
            DuplicateCategory::ExactDuplicate => self.exact,
            DuplicateCategory::SameIdDifferentPhone => self.same_id,
            DuplicateCategory::SamePhoneDifferentId => self.same_phone,
            DuplicateCategory::ComplexDuplicate => self.complex,
        }
    }

    /// Records in any duplicate category.
    pub fn duplicates(&self) -> usize {
        self.exact + self.same_id + self.same_phone + self.complex
    }

    /// Percentage of records that are not unique. Zero for an empty set.
    pub fn duplicate_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        round2((1.0 - self.unique as f64 / self.total as f64) * 100.0)
    }

    /// Check that the five categories account for every record.
    pub fn reconcile(&self) -> Reconciliation {
        let category_sum = self.unique + self.duplicates();
        Reconciliation {
            total: self.total,
            category_sum,
            balanced: category_sum == self.total,
        }
    }
}

/// Result of the category reconciliation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub total: usize,
    pub category_sum: usize,
    pub balanced: bool,
}

/// Duplicate statistics for one county.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyDuplicateRow {
    pub county: String,
    pub counts: CategoryCounts,
    pub total_duplicates: usize,
    pub duplicate_rate: f64,
}

/// Per-county duplicate table, highest duplicate rate first.
pub fn county_duplicate_intelligence(records: &[Record]) -> Vec<CountyDuplicateRow> {
    let mut rows: Vec<CountyDuplicateRow> = group_by_county(records)
        .into_iter()
        .map(|(county, members)| {
            let counts = CategoryCounts::from_records(members);
            let total_duplicates = counts.duplicates();
            CountyDuplicateRow {
                county,
                counts,
                total_duplicates,
                duplicate_rate: percent(total_duplicates, counts.total),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.duplicate_rate
            .partial_cmp(&a.duplicate_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.county.cmp(&b.county))
    });

    rows
}

/// Record count and share for one county.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyShare {
    pub county: String,
    pub count: usize,
    pub percent: f64,
}

/// Counties by record count, largest first.
pub fn county_distribution(records: &[Record]) -> Vec<CountyShare> {
    let total = records.len();
    let mut shares: Vec<CountyShare> = group_by_county(records)
        .into_iter()
        .map(|(county, members)| CountyShare {
            county,
            count: members.len(),
            percent: percent(members.len(), total),
        })
        .collect();

    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.county.cmp(&b.county)));
    shares
}

/// County x category cross tabulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossTab {
    /// Name of the column dimension (e.g. "Gender").
    pub dimension: String,
    pub columns: Vec<String>,
    pub rows: Vec<CrossTabRow>,
    /// Column totals, aligned with `columns`.
    pub totals: Vec<usize>,
    pub grand_total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossTabRow {
    pub county: String,
    pub counts: Vec<usize>,
    pub total: usize,
}

fn crosstab<K: Copy + PartialEq + Display>(
    records: &[Record],
    dimension: &str,
    keys: &[K],
    key_of: impl Fn(&Record) -> K,
) -> CrossTab {
    let rows: Vec<CrossTabRow> = group_by_county(records)
        .into_iter()
        .map(|(county, members)| {
            let mut counts = vec![0usize; keys.len()];
            for record in members.iter().copied() {
                let key = key_of(record);
                if let Some(slot) = keys.iter().position(|k| *k == key) {
                    counts[slot] += 1;
                }
            }
            let total = counts.iter().sum();
            CrossTabRow {
                county,
                counts,
                total,
            }
        })
        .collect();

    let totals: Vec<usize> = (0..keys.len())
        .map(|i| rows.iter().map(|r| r.counts[i]).sum())
        .collect();

    CrossTab {
        dimension: dimension.to_string(),
        columns: keys.iter().map(|k| k.to_string()).collect(),
        grand_total: totals.iter().sum(),
        rows,
        totals,
    }
}

pub fn county_by_gender(records: &[Record]) -> CrossTab {
    crosstab(records, "Gender", &Gender::ALL, |r| r.gender)
}

pub fn county_by_age_group(records: &[Record]) -> CrossTab {
    crosstab(records, "Age Group", &AgeGroup::ALL, |r| r.age_group)
}

pub fn county_by_disability(records: &[Record]) -> CrossTab {
    crosstab(records, "Disability", &DisabilityStatus::ALL, |r| r.disability)
}

/// One line of the indicator table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub name: String,
    pub value: usize,
}

/// Flat indicator table over the cleaned records.
pub fn indicators(records: &[Record]) -> Vec<Indicator> {
    let count = |pred: &dyn Fn(&Record) -> bool| records.iter().filter(|r| pred(*r)).count();

    let female = |r: &Record| r.gender == Gender::Female;
    let male = |r: &Record| r.gender == Gender::Male;
    let youth = |r: &Record| r.age_group == AgeGroup::Youth;
    let adult = |r: &Record| r.age_group == AgeGroup::Adult;
    let pwd = |r: &Record| r.disability == DisabilityStatus::Yes;

    let rows = [
        ("Total", records.len()),
        ("Female", count(&female)),
        ("Male", count(&male)),
        ("Youth (18-35)", count(&youth)),
        ("Adult (36+)", count(&adult)),
        ("Under 18", count(&|r| r.age_group == AgeGroup::Under18)),
        ("Age unknown", count(&|r| r.age_group == AgeGroup::Unknown)),
        ("Youth female", count(&|r| youth(r) && female(r))),
        ("Youth male", count(&|r| youth(r) && male(r))),
        ("Adult female", count(&|r| adult(r) && female(r))),
        ("Adult male", count(&|r| adult(r) && male(r))),
        ("PWD total", count(&pwd)),
        ("PWD female", count(&|r| pwd(r) && female(r))),
        ("PWD male", count(&|r| pwd(r) && male(r))),
        ("PWD youth", count(&|r| pwd(r) && youth(r))),
        ("PWD adult", count(&|r| pwd(r) && adult(r))),
    ];

    rows.into_iter()
        .map(|(name, value)| Indicator {
            name: name.to_string(),
            value,
        })
        .collect()
}

/// All demographic summaries for the cleaned records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemographicSummary {
    pub total: usize,
    pub county_distribution: Vec<CountyShare>,
    pub by_gender: CrossTab,
    pub by_age_group: CrossTab,
    pub by_disability: CrossTab,
    pub indicators: Vec<Indicator>,
}

pub fn summarize_demographics(records: &[Record]) -> DemographicSummary {
    DemographicSummary {
        total: records.len(),
        county_distribution: county_distribution(records),
        by_gender: county_by_gender(records),
        by_age_group: county_by_age_group(records),
        by_disability: county_by_disability(records),
        indicators: indicators(records),
    }
}

/// Record-level audit of a single county.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountyAudit {
    pub county: String,
    pub counts: CategoryCounts,
    /// Every record in the county, in input order.
    #[serde(skip)]
    pub records: Vec<Record>,
}

impl CountyAudit {
    /// Records of the county in one category.
    pub fn subset(&self, category: DuplicateCategory) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|r| r.category == category)
            .collect()
    }
}

/// Audit one county. Names match case-insensitively.
pub fn county_audit(records: &[Record], county: &str) -> CountyAudit {
    let wanted = county.trim();
    let members: Vec<Record> = records
        .iter()
        .filter(|r| r.county_label().eq_ignore_ascii_case(wanted))
        .cloned()
        .collect();

    let name = members
        .first()
        .map(|r| r.county_label().to_string())
        .unwrap_or_else(|| wanted.to_string());

    CountyAudit {
        county: name,
        counts: CategoryCounts::from_records(&members),
        records: members,
    }
}

/// Group records by county label, sorted by county.
fn group_by_county(records: &[Record]) -> BTreeMap<String, Vec<&Record>> {
    let mut grouped: BTreeMap<String, Vec<&Record>> = BTreeMap::new();

    for record in records {
        grouped
            .entry(record.county_label().to_string())
            .or_default()
            .push(record);
    }

    grouped
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classifier::classify;
    use crate::analysis::cleaning::clean;
    use crate::analysis::test_support::sample_records;
    use crate::models::{BlankKeyPolicy, CleaningLevel};

    fn classified() -> Vec<Record> {
        let mut records = sample_records();
        classify(&mut records, BlankKeyPolicy::NoMatch);
        records
    }

    fn indicator(list: &[Indicator], name: &str) -> usize {
        list.iter()
            .find(|i| i.name == name)
            .map(|i| i.value)
            .unwrap()
    }

    #[test]
    fn test_category_counts_and_rate() {
        let counts = CategoryCounts::from_records(&classified());

        assert_eq!(counts.total, 13);
        assert_eq!(counts.unique, 4);
        assert_eq!(counts.exact, 2);
        assert_eq!(counts.same_id, 3);
        assert_eq!(counts.same_phone, 3);
        assert_eq!(counts.complex, 1);
        assert_eq!(counts.duplicates(), 9);
        assert_eq!(counts.duplicate_rate(), 69.23);

        let check = counts.reconcile();
        assert!(check.balanced);
        assert_eq!(check.category_sum, 13);
    }

    #[test]
    fn test_empty_counts() {
        let counts = CategoryCounts::from_records(&[]);
        assert_eq!(counts.duplicate_rate(), 0.0);
        assert!(counts.reconcile().balanced);
    }

    #[test]
    fn test_county_duplicate_intelligence() {
        let rows = county_duplicate_intelligence(&classified());
        let names: Vec<&str> = rows.iter().map(|r| r.county.as_str()).collect();

        // Kisumu and Nairobi and Nakuru are 100% duplicates; ties sort by name
        assert_eq!(names, vec!["Kisumu", "Nairobi", "Nakuru", "(No county)", "Mombasa"]);

        let nakuru = &rows[2];
        assert_eq!(nakuru.counts.total, 3);
        assert_eq!(nakuru.counts.same_id, 1);
        assert_eq!(nakuru.counts.complex, 1);
        assert_eq!(nakuru.counts.same_phone, 1);
        assert_eq!(nakuru.duplicate_rate, 100.0);

        let mombasa = rows.last().unwrap();
        assert_eq!(mombasa.total_duplicates, 0);
        assert_eq!(mombasa.duplicate_rate, 0.0);

        let total: usize = rows.iter().map(|r| r.counts.total).sum();
        assert_eq!(total, 13);
    }

    #[test]
    fn test_county_distribution_shares() {
        let shares = county_distribution(&sample_records());

        // Four counties tie at 3 records; ties sort by name
        assert_eq!(shares[0].county, "Kisumu");
        assert_eq!(shares[0].count, 3);
        assert_eq!(shares[0].percent, 23.08);
        assert_eq!(shares.iter().map(|s| s.count).sum::<usize>(), 13);
    }

    #[test]
    fn test_crosstabs_partition_total() {
        let records = sample_records();

        for tab in [
            county_by_gender(&records),
            county_by_age_group(&records),
            county_by_disability(&records),
        ] {
            assert_eq!(tab.grand_total, records.len(), "{}", tab.dimension);
            assert_eq!(tab.rows.iter().map(|r| r.total).sum::<usize>(), records.len());
            assert_eq!(tab.columns.len(), tab.totals.len());
        }

        let gender = county_by_gender(&records);
        assert_eq!(gender.columns, vec!["Female", "Male", "Unspecified"]);
        assert_eq!(gender.totals, vec![8, 5, 0]);
    }

    #[test]
    fn test_indicators_on_cleaned_records() {
        let outcome = clean(&classified(), CleaningLevel::Exact, BlankKeyPolicy::NoMatch);
        let list = indicators(&outcome.records);

        assert_eq!(indicator(&list, "Total"), 12);
        assert_eq!(
            indicator(&list, "Female") + indicator(&list, "Male"),
            12
        );
        assert_eq!(indicator(&list, "Youth (18-35)"), 5);
        assert_eq!(indicator(&list, "Adult (36+)"), 5);
        assert_eq!(indicator(&list, "Under 18"), 1);
        assert_eq!(indicator(&list, "Age unknown"), 1);
        assert_eq!(indicator(&list, "PWD total"), 2);
        assert_eq!(indicator(&list, "PWD female"), 1);
        assert_eq!(indicator(&list, "PWD adult"), 2);
        assert_eq!(
            indicator(&list, "Youth female") + indicator(&list, "Youth male"),
            indicator(&list, "Youth (18-35)")
        );
    }

    #[test]
    fn test_county_audit() {
        let audit = county_audit(&classified(), "nakuru");

        assert_eq!(audit.county, "Nakuru");
        assert_eq!(audit.counts.total, 3);
        assert_eq!(audit.subset(DuplicateCategory::ComplexDuplicate).len(), 1);
        assert_eq!(audit.subset(DuplicateCategory::ExactDuplicate).len(), 0);

        let missing = county_audit(&classified(), "Atlantis");
        assert_eq!(missing.counts.total, 0);
        assert_eq!(missing.county, "Atlantis");
    }
}
