use crate::source::SourceRecord;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Outcome of [`SourceSet::insert_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Inserted,
    /// Same key and same hash as the record already held.
    Duplicate,
    /// Same key, different hash. The first record is kept.
    Conflict,
}

/// Resolved sources keyed by `packageName-version`; the first record stored
/// under a key wins.
///
/// Safe to share between lookup workers: check-and-insert happens under one lock.
#[derive(Debug, Default)]
pub struct SourceSet {
    records: Mutex<BTreeMap<String, SourceRecord>>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_if_absent(&self, record: SourceRecord) -> Insertion {
        let key = record.key();
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        match records.get(&key) {
            Some(existing) if existing.integrity == record.integrity => Insertion::Duplicate,
            Some(_) => Insertion::Conflict,
            None => {
                records.insert(key, record);
                Insertion::Inserted
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Records in ascending byte order of their key.
    pub fn into_sorted(self) -> Vec<SourceRecord> {
        self.records
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_values()
            .collect()
    }
}
