//! Run-wide, index-ordered list of stored segments.

use crate::types::SegmentRecord;

/// Accumulates per-batch records and hands out a strictly increasing list
///
/// Batches arrive in increasing start order, so appending keeps the list
/// sorted; [`finish`](Self::finish) still sorts and de-duplicates before the
/// list leaves the pipeline.
#[derive(Debug, Default)]
pub struct Sequencer {
    records: Vec<SegmentRecord>,
}

impl Sequencer {
    /// Create an empty sequencer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one batch worth of successful records
    pub fn push_batch(&mut self, mut batch: Vec<SegmentRecord>) {
        batch.sort_by_key(|record| record.index);
        self.records.extend(batch);
    }

    /// Number of records accumulated so far
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been accumulated yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Final list: stable-sorted by index, one record per index
    pub fn finish(mut self) -> Vec<SegmentRecord> {
        self.records.sort_by_key(|record| record.index);
        let before = self.records.len();
        self.records.dedup_by_key(|record| record.index);
        if self.records.len() != before {
            tracing::warn!(
                duplicates = before - self.records.len(),
                "Dropped duplicate segment records"
            );
        }
        self.records
    }
}
