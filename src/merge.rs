//! K-way merge stage.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io::prelude::*;

use log;
use tempfile::NamedTempFile;

use crate::record::{Comparator, RecordWriter};
use crate::sort::SortError;
use crate::source::RecordSource;

/// Frontier entry ordering sources by their peeked record.
/// Sources enter the frontier non-exhausted only, so a missing peek is never
/// compared in practice; it sorts last for totality.
struct MergeEntry(RecordSource);

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.peek(), other.0.peek()) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeEntry {}

/// Merges the sorted spill files into `output`, returning the number of
/// records written.
///
/// One [`RecordSource`] is opened per spill file and held in a min-priority
/// frontier keyed by its peeked record. Empty spills never enter the frontier.
/// Sources that become exhausted are closed and their spill file deleted
/// immediately, reclaiming storage before the merge completes. When several
/// sources peek equal records the pop order is whatever the heap yields;
/// multiplicity is preserved but no cross-stream tie-break order is promised.
///
/// On failure every source still in the frontier is closed before the error
/// propagates.
pub fn merge<W: Write>(
    spills: Vec<NamedTempFile>,
    comparator: Comparator,
    output: &mut RecordWriter<W>,
    rw_buf_size: Option<usize>,
) -> Result<u64, SortError> {
    log::debug!("merging {} spill file(s)", spills.len());

    // binary heap is max-heap by default so entries are reversed to make it a min-heap
    let mut frontier = BinaryHeap::with_capacity(spills.len());
    for spill in spills {
        let source = RecordSource::open(spill, comparator, rw_buf_size)?;
        if !source.is_exhausted() {
            frontier.push(std::cmp::Reverse(MergeEntry(source)));
        }
    }

    let result = drain_frontier(&mut frontier, output);
    if result.is_err() {
        for std::cmp::Reverse(MergeEntry(mut source)) in frontier.drain() {
            source.close();
        }
    }

    return result;
}

fn drain_frontier<W: Write>(
    frontier: &mut BinaryHeap<std::cmp::Reverse<MergeEntry>>,
    output: &mut RecordWriter<W>,
) -> Result<u64, SortError> {
    let mut written = 0u64;

    while let Some(std::cmp::Reverse(MergeEntry(mut source))) = frontier.pop() {
        let record = match source.consume()? {
            Some(record) => record,
            None => continue,
        };

        output.write_record(record.text()).map_err(SortError::Output)?;
        written += 1;

        if source.is_exhausted() {
            // dropping the source closes it and deletes its spill file
            source.close();
        } else {
            frontier.push(std::cmp::Reverse(MergeEntry(source)));
        }
    }

    return Ok(written);
}
