//! Data models for the microdata auditor.
//!
//! This module contains the core data structures used throughout
//! the application for representing survey records, their derived
//! demographic labels, and the final report.

use crate::analysis::{
    CategoryCounts, CleaningImpact, CountyAudit, CountyDuplicateRow, DemographicSummary,
    Reconciliation,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Duplicate classification of a single record.
///
/// Every record in a classified set carries exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateCategory {
    /// Neither the national ID nor the phone number occurs elsewhere.
    #[default]
    Unique,
    /// Same national ID and same phone number as another record.
    ExactDuplicate,
    /// National ID repeated, phone number not.
    SameIdDifferentPhone,
    /// Phone number repeated, national ID not.
    SamePhoneDifferentId,
    /// ID and phone are both repeated, but never together.
    ComplexDuplicate,
}

impl DuplicateCategory {
    /// All categories in reporting order.
    pub const ALL: [DuplicateCategory; 5] = [
        DuplicateCategory::Unique,
        DuplicateCategory::ExactDuplicate,
        DuplicateCategory::SameIdDifferentPhone,
        DuplicateCategory::SamePhoneDifferentId,
        DuplicateCategory::ComplexDuplicate,
    ];

    /// Returns true for every category except `Unique`.
    pub fn is_duplicate(&self) -> bool {
        !matches!(self, DuplicateCategory::Unique)
    }

    /// Short prefix used for record-level export file names.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            DuplicateCategory::Unique => "Unique",
            DuplicateCategory::ExactDuplicate => "ExactDups",
            DuplicateCategory::SameIdDifferentPhone => "SameID",
            DuplicateCategory::SamePhoneDifferentId => "SamePhone",
            DuplicateCategory::ComplexDuplicate => "Complex",
        }
    }
}

impl fmt::Display for DuplicateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateCategory::Unique => write!(f, "Unique"),
            DuplicateCategory::ExactDuplicate => write!(f, "Exact Duplicate (Same ID + Phone)"),
            DuplicateCategory::SameIdDifferentPhone => write!(f, "Same ID, Different Phone"),
            DuplicateCategory::SamePhoneDifferentId => write!(f, "Same Phone, Different ID"),
            DuplicateCategory::ComplexDuplicate => write!(f, "Complex Duplicate"),
        }
    }
}

/// Age bracket derived from the numeric age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Unknown,
    Under18,
    Youth,
    Adult,
}

impl AgeGroup {
    /// All groups in reporting order.
    pub const ALL: [AgeGroup; 4] = [
        AgeGroup::Youth,
        AgeGroup::Adult,
        AgeGroup::Under18,
        AgeGroup::Unknown,
    ];

    /// Derive the age group. `None` (missing or non-numeric age) is `Unknown`.
    pub fn from_age(age: Option<f64>) -> Self {
        match age {
            None => AgeGroup::Unknown,
            Some(a) if a.is_nan() => AgeGroup::Unknown,
            Some(a) if a < 18.0 => AgeGroup::Under18,
            Some(a) if a <= 35.0 => AgeGroup::Youth,
            Some(_) => AgeGroup::Adult,
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgeGroup::Unknown => write!(f, "Unknown"),
            AgeGroup::Under18 => write!(f, "Under 18"),
            AgeGroup::Youth => write!(f, "Youth (18-35)"),
            AgeGroup::Adult => write!(f, "Adult (36+)"),
        }
    }
}

/// Disability status derived from a free-text survey answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabilityStatus {
    Yes,
    No,
    Unspecified,
}

impl DisabilityStatus {
    pub const ALL: [DisabilityStatus; 3] = [
        DisabilityStatus::Yes,
        DisabilityStatus::No,
        DisabilityStatus::Unspecified,
    ];

    /// Case-insensitive substring match; "yes" wins over "no".
    pub fn from_response(response: Option<&str>) -> Self {
        let Some(text) = response else {
            return DisabilityStatus::Unspecified;
        };

        let lowered = text.to_lowercase();
        if lowered.contains("yes") {
            DisabilityStatus::Yes
        } else if lowered.contains("no") {
            DisabilityStatus::No
        } else {
            DisabilityStatus::Unspecified
        }
    }
}

impl fmt::Display for DisabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisabilityStatus::Yes => write!(f, "Yes"),
            DisabilityStatus::No => write!(f, "No"),
            DisabilityStatus::Unspecified => write!(f, "Unspecified"),
        }
    }
}

/// Normalized gender of a respondent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
    Unspecified,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Female, Gender::Male, Gender::Unspecified];
}

impl From<&str> for Gender {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "female" | "f" | "woman" => Gender::Female,
            "male" | "m" | "man" => Gender::Male,
            _ => Gender::Unspecified,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Female => write!(f, "Female"),
            Gender::Male => write!(f, "Male"),
            Gender::Unspecified => write!(f, "Unspecified"),
        }
    }
}

/// Deduplication strictness. Each level includes the ones below it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CleaningLevel {
    /// Keep every record.
    None,
    /// Drop repeated (ID, phone) pairs.
    #[default]
    Exact,
    /// Additionally drop repeated national IDs.
    Id,
    /// Additionally drop repeated phone numbers.
    Phone,
}

impl CleaningLevel {
    /// Numeric strictness, 0 through 3.
    pub fn as_number(&self) -> u8 {
        match self {
            CleaningLevel::None => 0,
            CleaningLevel::Exact => 1,
            CleaningLevel::Id => 2,
            CleaningLevel::Phone => 3,
        }
    }
}

impl fmt::Display for CleaningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleaningLevel::None => write!(f, "Level 0 (no cleaning)"),
            CleaningLevel::Exact => write!(f, "Level 1 (exact ID + phone)"),
            CleaningLevel::Id => write!(f, "Level 2 (+ repeated ID)"),
            CleaningLevel::Phone => write!(f, "Level 3 (+ repeated phone)"),
        }
    }
}

/// How blank national IDs and phone numbers take part in matching.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum BlankKeyPolicy {
    /// A blank key is an ordinary value; all blanks match each other.
    Literal,
    /// A blank key never matches anything.
    #[default]
    NoMatch,
}

impl BlankKeyPolicy {
    /// Returns true if `key` may be compared against other keys.
    pub fn participates(&self, key: &str) -> bool {
        match self {
            BlankKeyPolicy::Literal => true,
            BlankKeyPolicy::NoMatch => !key.is_empty(),
        }
    }
}

/// One survey row with its matching keys and derived labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Position of the row in the loaded table (0-indexed).
    pub row: usize,
    /// National ID, trimmed. Empty when absent.
    pub national_id: String,
    /// Phone number, trimmed. Empty when absent.
    pub phone_number: String,
    /// County (business location).
    pub county: Option<String>,
    pub gender: Gender,
    /// Age in years, `None` when missing or not numeric.
    pub age: Option<f64>,
    pub age_group: AgeGroup,
    pub disability: DisabilityStatus,
    /// Submission or training time, `None` when unparseable.
    pub timestamp: Option<NaiveDateTime>,
    /// Assigned by the classifier.
    #[serde(default)]
    pub category: DuplicateCategory,
}

impl Record {
    /// County label used for grouping.
    pub fn county_label(&self) -> &str {
        self.county.as_deref().unwrap_or(NO_COUNTY)
    }
}

/// Grouping label for records without a county.
pub const NO_COUNTY: &str = "(No county)";

/// Metadata about a generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// URL or path the dataset was read from.
    pub source: String,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// When the dataset was fetched (may be older when served from cache).
    pub fetched_at: DateTime<Utc>,
    /// Whether the dataset came from the cache.
    pub from_cache: bool,
    /// Rows in the loaded table.
    pub rows_loaded: usize,
    /// Rows left after date and county filters.
    pub rows_filtered: usize,
    /// Filtered rows kept despite having no parseable timestamp.
    #[serde(default)]
    pub undated_included: usize,
    /// Human-readable description of the active filters.
    pub filters: String,
    pub cleaning_level: CleaningLevel,
    pub blank_keys: BlankKeyPolicy,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// Category counts over the filtered, uncleaned records.
    pub summary: CategoryCounts,
    pub reconciliation: Reconciliation,
    pub county_duplicates: Vec<CountyDuplicateRow>,
    pub cleaning: CleaningImpact,
    /// Demographics over the cleaned records.
    pub demographics: DemographicSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<CountyAudit>,
}
