use std::collections::HashSet;
use std::hash::Hash;

use crate::types::NormalizedRecord;

/// Unique items in first-seen order, plus how many were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Deduplicated<T> {
    pub unique: Vec<T>,
    pub removed: usize,
}

/// Keep the first occurrence of every distinct key, preserving input order.
pub fn deduplicate_by<T, K, F>(items: Vec<T>, key: F) -> Deduplicated<T>
where
    K: Hash + Eq + ?Sized,
    F: Fn(&T) -> &K,
{
    let total = items.len();
    let keep: Vec<bool> = {
        let mut seen: HashSet<&K> = HashSet::with_capacity(total);
        items.iter().map(|item| seen.insert(key(item))).collect()
    };

    let unique: Vec<T> = items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, first)| first.then_some(item))
        .collect();
    let removed = total - unique.len();

    Deduplicated { unique, removed }
}

/// Whole-record deduplication: two records are duplicates only when every
/// field name and value matches.
pub fn deduplicate(records: Vec<NormalizedRecord>) -> Deduplicated<NormalizedRecord> {
    deduplicate_by(records, |record| record)
}
