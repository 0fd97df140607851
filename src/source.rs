//! One-record-lookahead cursor over a spill file.

use std::fs;
use std::io;

use tempfile::NamedTempFile;

use crate::record::{Comparator, Framing, Record, RecordReader};
use crate::sort::SortError;

/// A cursor over one spill file with exactly one record of lookahead cached,
/// bounding its memory use to O(1) records regardless of stream length.
///
/// The source owns its backing temporary file; dropping the source deletes it.
/// Once exhausted a source stays exhausted.
pub struct RecordSource {
    reader: Option<RecordReader<io::BufReader<fs::File>>>,
    // held for its drop only: the backing spill file is removed with the source
    _spill: NamedTempFile,
    cache: Option<Record>,
    comparator: Comparator,
}

impl RecordSource {
    /// Opens a spill file for merging, taking ownership of it, and loads the
    /// first record into the lookahead cache.
    pub fn open(spill: NamedTempFile, comparator: Comparator, rw_buf_size: Option<usize>) -> Result<Self, SortError> {
        let file = spill.reopen().map_err(SortError::TempFile)?;
        let reader = match rw_buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };

        let mut source = RecordSource {
            reader: Some(RecordReader::new(reader, Framing::Lines)),
            _spill: spill,
            cache: None,
            comparator,
        };
        source.reload()?;

        return Ok(source);
    }

    /// Returns the next unconsumed record without advancing.
    /// Repeatable: the same record is returned until [`consume`](Self::consume) is called.
    pub fn peek(&self) -> Option<&Record> {
        self.cache.as_ref()
    }

    /// Returns the current record and advances the lookahead by one.
    /// Returns [`None`] once the stream is exhausted.
    pub fn consume(&mut self) -> Result<Option<Record>, SortError> {
        let current = self.cache.take();
        if current.is_some() {
            self.reload()?;
        }

        return Ok(current);
    }

    /// True once the lookahead cache holds no record.
    pub fn is_exhausted(&self) -> bool {
        self.cache.is_none()
    }

    /// Releases the underlying file handle. Idempotent.
    /// The backing spill file itself is deleted when the source is dropped.
    pub fn close(&mut self) {
        self.reader = None;
    }

    fn reload(&mut self) -> Result<(), SortError> {
        self.cache = match self.reader.as_mut().and_then(Iterator::next) {
            Some(Ok(text)) => Some(self.comparator.record(text).map_err(SortError::Parse)?),
            Some(Err(err)) => return Err(SortError::TempFile(err)),
            None => {
                self.close();
                None
            }
        };

        return Ok(());
    }
}

#[cfg(test)]
mod test {
    use std::io::prelude::*;

    use rstest::*;
    use tempfile::NamedTempFile;

    use super::RecordSource;
    use crate::record::Comparator;

    #[fixture]
    fn spill() -> NamedTempFile {
        let mut spill = NamedTempFile::new().unwrap();
        spill.write_all(b"a\nb\n").unwrap();
        spill.flush().unwrap();
        spill
    }

    #[rstest]
    fn test_peek_is_repeatable(spill: NamedTempFile) {
        let source = RecordSource::open(spill, Comparator::Text, None).unwrap();

        assert_eq!(source.peek().unwrap().text(), "a");
        assert_eq!(source.peek().unwrap().text(), "a");
        assert!(!source.is_exhausted());
    }

    #[rstest]
    fn test_consume_drains_in_order(spill: NamedTempFile) {
        let mut source = RecordSource::open(spill, Comparator::Text, None).unwrap();

        assert_eq!(source.consume().unwrap().unwrap().text(), "a");
        assert_eq!(source.peek().unwrap().text(), "b");
        assert_eq!(source.consume().unwrap().unwrap().text(), "b");

        assert!(source.is_exhausted());
        assert!(source.consume().unwrap().is_none());
        assert!(source.is_exhausted());
    }

    #[rstest]
    fn test_empty_stream_is_immediately_exhausted() {
        let spill = NamedTempFile::new().unwrap();
        let source = RecordSource::open(spill, Comparator::Text, None).unwrap();

        assert!(source.is_exhausted());
        assert!(source.peek().is_none());
    }

    #[rstest]
    fn test_close_is_idempotent(spill: NamedTempFile) {
        let mut source = RecordSource::open(spill, Comparator::Text, None).unwrap();
        source.close();
        source.close();
    }

    #[rstest]
    fn test_drop_deletes_spill_file(spill: NamedTempFile) {
        let path = spill.path().to_path_buf();
        let source = RecordSource::open(spill, Comparator::Text, None).unwrap();

        assert!(path.exists());
        drop(source);
        assert!(!path.exists());
    }
}
