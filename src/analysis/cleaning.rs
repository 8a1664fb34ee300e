//! Deduplication at increasing strictness levels.
//!
//! The first occurrence of a key always wins. Level 1 removes repeated
//! (ID, phone) pairs, level 2 then removes repeated IDs, and level 3 then
//! removes repeated phone numbers. Every stage works on the output of the
//! stage before it.

use crate::models::{BlankKeyPolicy, CleaningLevel, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Row counts for one cleaning stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningStage {
    pub level: CleaningLevel,
    pub before: usize,
    pub removed: usize,
    pub after: usize,
}

/// Ledger of how cleaning changed the record count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningImpact {
    /// Strictness that was requested.
    pub level: CleaningLevel,
    pub input: usize,
    /// One entry per applied stage, in order.
    pub stages: Vec<CleaningStage>,
    pub output: usize,
}

impl CleaningImpact {
    /// Total records removed across all stages.
    pub fn removed(&self) -> usize {
        self.input - self.output
    }

    /// Share of input records removed, in percent.
    pub fn removed_percent(&self) -> f64 {
        if self.input == 0 {
            0.0
        } else {
            round2(self.removed() as f64 / self.input as f64 * 100.0)
        }
    }
}

/// Cleaned records plus the impact ledger.
#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    pub records: Vec<Record>,
    pub impact: CleaningImpact,
}

/// Deduplicate `records` up to `level`.
pub fn clean(records: &[Record], level: CleaningLevel, policy: BlankKeyPolicy) -> CleaningOutcome {
    let mut current: Vec<Record> = records.to_vec();
    let mut stages = Vec::new();

    for stage in [CleaningLevel::Exact, CleaningLevel::Id, CleaningLevel::Phone] {
        if stage > level {
            break;
        }

        let before = current.len();
        current = match stage {
            CleaningLevel::Exact => keep_first(current, policy, |r| {
                [r.national_id.as_str(), r.phone_number.as_str()]
            }),
            CleaningLevel::Id => keep_first(current, policy, |r| [r.national_id.as_str()]),
            CleaningLevel::Phone => keep_first(current, policy, |r| [r.phone_number.as_str()]),
            CleaningLevel::None => current,
        };
        let after = current.len();

        debug!("{}: {} -> {} records", stage, before, after);
        stages.push(CleaningStage {
            level: stage,
            before,
            removed: before - after,
            after,
        });
    }

    let impact = CleaningImpact {
        level,
        input: records.len(),
        stages,
        output: current.len(),
    };

    CleaningOutcome {
        records: current,
        impact,
    }
}

/// Keep the first record for each key. Keys with a non-participating
/// (blank) component are never treated as seen.
fn keep_first<const N: usize>(
    records: Vec<Record>,
    policy: BlankKeyPolicy,
    key: impl Fn(&Record) -> [&str; N],
) -> Vec<Record> {
    let mut seen: HashSet<Vec<String>> = HashSet::new();

    records
        .into_iter()
        .filter(|record| {
            let parts = key(record);
            if !parts.iter().all(|p| policy.participates(p)) {
                return true;
            }
            seen.insert(parts.iter().map(|p| p.to_string()).collect())
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
