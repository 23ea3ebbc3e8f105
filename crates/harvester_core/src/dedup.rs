use std::collections::HashSet;

use crate::ListingRecord;

/// Run-wide accumulator that admits each listing id at most once.
///
/// Membership check and insertion happen in one `try_add` call, so the seen
/// set and the ordered collection never disagree. The set only grows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DedupStore {
    seen: HashSet<String>,
    records: Vec<ListingRecord>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` iff the record's id was unseen and the record was appended.
    pub fn try_add(&mut self, record: ListingRecord) -> bool {
        if !self.seen.insert(record.ad_id.clone()) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in first-seen order.
    pub fn snapshot(&self) -> &[ListingRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ListingRecord> {
        self.records
    }
}
