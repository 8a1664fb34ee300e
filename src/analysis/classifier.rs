//! Duplicate classification.
//!
//! Each record gets three flags computed over the whole set: whether its
//! national ID repeats, whether its phone number repeats, and whether the
//! (ID, phone) pair repeats. The flags map to exactly one
//! [`DuplicateCategory`].

use crate::models::{BlankKeyPolicy, DuplicateCategory, Record};
use std::collections::HashMap;
use tracing::debug;

/// Repetition flags for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DuplicateFlags {
    pub id_dup: bool,
    pub phone_dup: bool,
    pub exact_dup: bool,
}

impl DuplicateFlags {
    /// Map flags to a category. Checks run in a fixed order.
    pub fn category(&self) -> DuplicateCategory {
        if !self.id_dup && !self.phone_dup {
            DuplicateCategory::Unique
        } else if self.exact_dup {
            DuplicateCategory::ExactDuplicate
        } else if self.id_dup && !self.phone_dup {
            DuplicateCategory::SameIdDifferentPhone
        } else if self.phone_dup && !self.id_dup {
            DuplicateCategory::SamePhoneDifferentId
        } else {
            DuplicateCategory::ComplexDuplicate
        }
    }
}

/// Compute flags for every record, in input order.
pub fn compute_flags(records: &[Record], policy: BlankKeyPolicy) -> Vec<DuplicateFlags> {
    let mut id_counts: HashMap<&str, usize> = HashMap::new();
    let mut phone_counts: HashMap<&str, usize> = HashMap::new();
    let mut pair_counts: HashMap<(&str, &str), usize> = HashMap::new();

    for record in records {
        let id = record.national_id.as_str();
        let phone = record.phone_number.as_str();
        *id_counts.entry(id).or_default() += 1;
        *phone_counts.entry(phone).or_default() += 1;
        *pair_counts.entry((id, phone)).or_default() += 1;
    }

    records
        .iter()
        .map(|record| {
            let id = record.national_id.as_str();
            let phone = record.phone_number.as_str();
            let id_ok = policy.participates(id);
            let phone_ok = policy.participates(phone);

            DuplicateFlags {
                id_dup: id_ok && id_counts[id] > 1,
                phone_dup: phone_ok && phone_counts[phone] > 1,
                exact_dup: id_ok && phone_ok && pair_counts[&(id, phone)] > 1,
            }
        })
        .collect()
}

/// Assign a category to every record in place.
pub fn classify(records: &mut [Record], policy: BlankKeyPolicy) {
    let flags = compute_flags(records, policy);

    for (record, flags) in records.iter_mut().zip(flags) {
        record.category = flags.category();
    }

    debug!(
        "Classified {} records ({} duplicates)",
        records.len(),
        records.iter().filter(|r| r.category.is_duplicate()).count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::{keyed, sample_records};
    use proptest::prelude::*;

    fn categories(pairs: &[(&str, &str)], policy: BlankKeyPolicy) -> Vec<DuplicateCategory> {
        let mut records = keyed(pairs);
        classify(&mut records, policy);
        records.into_iter().map(|r| r.category).collect()
    }

    #[test]
    fn test_mixed_example() {
        use DuplicateCategory::*;

        let got = categories(
            &[("1", "A"), ("1", "A"), ("1", "B"), ("2", "B")],
            BlankKeyPolicy::Literal,
        );
        assert_eq!(
            got,
            vec![
                ExactDuplicate,
                ExactDuplicate,
                ComplexDuplicate,
                SamePhoneDifferentId
            ]
        );
    }

    #[test]
    fn test_flags_for_mixed_example() {
        let records = keyed(&[("1", "A"), ("1", "A"), ("1", "B"), ("2", "B")]);
        let flags = compute_flags(&records, BlankKeyPolicy::Literal);

        assert_eq!(
            flags[2],
            DuplicateFlags {
                id_dup: true,
                phone_dup: true,
                exact_dup: false
            }
        );
        assert_eq!(
            flags[3],
            DuplicateFlags {
                id_dup: false,
                phone_dup: true,
                exact_dup: false
            }
        );
    }

    #[test]
    fn test_exact_pair() {
        let got = categories(&[("1", "A"), ("1", "A"), ("2", "B")], BlankKeyPolicy::Literal);
        assert_eq!(
            got,
            vec![
                DuplicateCategory::ExactDuplicate,
                DuplicateCategory::ExactDuplicate,
                DuplicateCategory::Unique
            ]
        );
    }

    #[test]
    fn test_same_id_different_phone() {
        let got = categories(&[("1", "A"), ("1", "B")], BlankKeyPolicy::Literal);
        assert_eq!(got, vec![DuplicateCategory::SameIdDifferentPhone; 2]);
    }

    #[test]
    fn test_same_phone_different_id() {
        let got = categories(&[("1", "A"), ("2", "A")], BlankKeyPolicy::Literal);
        assert_eq!(got, vec![DuplicateCategory::SamePhoneDifferentId; 2]);
    }

    #[test]
    fn test_blank_keys_literal_match_each_other() {
        let got = categories(&[("", ""), ("", ""), ("1", "A")], BlankKeyPolicy::Literal);
        assert_eq!(got[0], DuplicateCategory::ExactDuplicate);
        assert_eq!(got[1], DuplicateCategory::ExactDuplicate);
        assert_eq!(got[2], DuplicateCategory::Unique);
    }

    #[test]
    fn test_blank_keys_no_match() {
        let got = categories(&[("", ""), ("", ""), ("", "A"), ("1", "A")], BlankKeyPolicy::NoMatch);
        assert_eq!(got[0], DuplicateCategory::Unique);
        assert_eq!(got[1], DuplicateCategory::Unique);
        // Blank ID never matches, phone still does
        assert_eq!(got[2], DuplicateCategory::SamePhoneDifferentId);
        assert_eq!(got[3], DuplicateCategory::SamePhoneDifferentId);
    }

    #[test]
    fn test_sample_dataset() {
        use DuplicateCategory::*;

        let mut records = sample_records();
        classify(&mut records, BlankKeyPolicy::NoMatch);
        let got: Vec<_> = records.iter().map(|r| r.category).collect();

        assert_eq!(
            got,
            vec![
                ExactDuplicate,
                ExactDuplicate,
                SameIdDifferentPhone,
                SameIdDifferentPhone,
                SamePhoneDifferentId,
                SamePhoneDifferentId,
                SameIdDifferentPhone,
                ComplexDuplicate,
                SamePhoneDifferentId,
                Unique,
                Unique,
                Unique,
                Unique,
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(compute_flags(&[], BlankKeyPolicy::Literal).is_empty());
    }

    proptest! {
        #[test]
        fn prop_categories_reconcile(pairs in prop::collection::vec((0u8..6, 0u8..6), 0..60)) {
            let owned: Vec<(String, String)> = pairs
                .iter()
                .map(|(i, p)| (i.to_string(), format!("07{}", p)))
                .collect();
            let borrowed: Vec<(&str, &str)> =
                owned.iter().map(|(i, p)| (i.as_str(), p.as_str())).collect();

            let mut records = keyed(&borrowed);
            classify(&mut records, BlankKeyPolicy::Literal);

            let mut counts = [0usize; 5];
            for r in &records {
                let slot = DuplicateCategory::ALL.iter().position(|c| *c == r.category).unwrap();
                counts[slot] += 1;
            }
            prop_assert_eq!(counts.iter().sum::<usize>(), records.len());

            // An exact duplicate never stands alone
            prop_assert!(counts[1] != 1);
        }
    }
}
