//! Split-sort-spill stage.

use std::io;
use std::io::prelude::*;
use std::path::Path;

use log;
use tempfile::NamedTempFile;

use crate::estimate::record_cost;
use crate::record::{Comparator, Framing, Record, RecordReader, RecordWriter};
use crate::sort::SortError;

/// Streams the input, accumulating records into memory blocks bounded by
/// `block_size` (approximate cost, see [`record_cost`]), sorting each block
/// with the comparator and spilling it to its own temporary file.
///
/// The final partial block is spilled like any other; empty input produces no
/// spill files at all. Each returned file holds one record per line in sorted
/// order. Files are deleted when dropped, so an early return reclaims every
/// spill already handed back.
pub fn split<R: BufRead>(
    input: &mut RecordReader<R>,
    comparator: Comparator,
    block_size: u64,
    tmp_dir: &Path,
    rw_buf_size: Option<usize>,
) -> Result<Vec<NamedTempFile>, SortError> {
    let mut spills = Vec::new();
    let mut block: Vec<Record> = Vec::new();
    let mut block_cost = 0u64;

    while let Some(text) = input.read_record().map_err(SortError::Input)? {
        block_cost += record_cost(&text);
        block.push(comparator.record(text).map_err(SortError::Parse)?);

        if block_cost >= block_size {
            spills.push(spill_block(&mut block, tmp_dir, rw_buf_size)?);
            block_cost = 0;
        }
    }

    if !block.is_empty() {
        spills.push(spill_block(&mut block, tmp_dir, rw_buf_size)?);
    }

    log::debug!("split produced {} sorted block(s)", spills.len());

    return Ok(spills);
}

fn spill_block(block: &mut Vec<Record>, tmp_dir: &Path, rw_buf_size: Option<usize>) -> Result<NamedTempFile, SortError> {
    log::debug!("sorting block of {} record(s)", block.len());
    block.sort();

    let spill = NamedTempFile::new_in(tmp_dir).map_err(SortError::TempFile)?;
    let file = spill.as_file().try_clone().map_err(SortError::TempFile)?;
    let writer = match rw_buf_size {
        Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
        None => io::BufWriter::new(file),
    };

    let mut writer = RecordWriter::new(writer, Framing::Lines);
    for record in block.drain(..) {
        writer.write_record(record.text()).map_err(SortError::TempFile)?;
    }
    writer.finish().map_err(SortError::TempFile)?;

    return Ok(spill);
}

#[cfg(test)]
mod test {
    use std::fs;

    use rstest::*;
    use tempfile::NamedTempFile;

    use super::split;
    use crate::record::{Comparator, Framing, RecordReader};

    fn split_lines(input: &str, comparator: Comparator, block_size: u64) -> Vec<NamedTempFile> {
        let mut reader = RecordReader::new(input.as_bytes(), Framing::Lines);
        split(&mut reader, comparator, block_size, &std::env::temp_dir(), None).unwrap()
    }

    fn spill_contents(spill: &NamedTempFile) -> String {
        fs::read_to_string(spill.path()).unwrap()
    }

    #[rstest]
    fn test_single_block() {
        let spills = split_lines("c\na\nb\n", Comparator::Text, u64::MAX);

        assert_eq!(spills.len(), 1);
        assert_eq!(spill_contents(&spills[0]), "a\nb\nc\n");
    }

    #[rstest]
    fn test_each_block_internally_sorted() {
        // a budget of 1 is exceeded by any single record, giving one spill per record
        let spills = split_lines("5\n3\n8\n", Comparator::Numeric, 1);

        assert_eq!(spills.len(), 3);
        let contents: Vec<String> = spills.iter().map(spill_contents).collect();
        assert_eq!(contents, vec!["5\n", "3\n", "8\n"]);
    }

    #[rstest]
    fn test_final_partial_block_is_spilled() {
        // three records per block: [5,3,8] spills at the threshold, [1] remains at
        // end-of-input and must be spilled too
        let block_size = 3 * crate::estimate::record_cost("5");
        let spills = split_lines("5\n3\n8\n1\n", Comparator::Numeric, block_size);

        assert_eq!(spills.len(), 2);
        assert_eq!(spill_contents(&spills[0]), "3\n5\n8\n");
        assert_eq!(spill_contents(&spills[1]), "1\n");
    }

    #[rstest]
    fn test_empty_input_spills_nothing() {
        let spills = split_lines("", Comparator::Text, 1);
        assert!(spills.is_empty());
    }

    #[rstest]
    fn test_duplicates_are_kept() {
        let spills = split_lines("4\n4\n1\n", Comparator::Numeric, u64::MAX);

        assert_eq!(spills.len(), 1);
        assert_eq!(spill_contents(&spills[0]), "1\n4\n4\n");
    }

    #[rstest]
    fn test_numeric_parse_failure_aborts() {
        let mut reader = RecordReader::new("1\nx\n3\n".as_bytes(), Framing::Lines);
        let result = split(&mut reader, Comparator::Numeric, u64::MAX, &std::env::temp_dir(), None);
        assert!(result.is_err());
    }
}
