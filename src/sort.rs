//! External sorter.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::Path;

use log;

use crate::estimate::{estimate_block_size, free_memory};
use crate::merge::merge;
use crate::record::{Comparator, Framing, ParseError, RecordReader, RecordWriter};
use crate::split::split;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Invalid sorter configuration.
    Config(String),
    /// Temporary directory creation error.
    TempDir(io::Error),
    /// Spill file creation/read/write error.
    TempFile(io::Error),
    /// Input stream error.
    Input(io::Error),
    /// Output stream error.
    Output(io::Error),
    /// Record could not be keyed under the numeric comparator.
    Parse(ParseError),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::Config(_) => None,
            SortError::TempDir(err) => Some(err),
            SortError::TempFile(err) => Some(err),
            SortError::Input(err) => Some(err),
            SortError::Output(err) => Some(err),
            SortError::Parse(err) => Some(err),
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::Config(reason) => write!(f, "invalid configuration: {}", reason),
            SortError::TempDir(err) => write!(f, "temporary directory not created: {}", err),
            SortError::TempFile(err) => write!(f, "spill file operation failed: {}", err),
            SortError::Input(err) => write!(f, "input stream error: {}", err),
            SortError::Output(err) => write!(f, "output stream error: {}", err),
            SortError::Parse(err) => write!(f, "record parsing error: {}", err),
        }
    }
}

/// Run statistics, returned as values rather than kept in process-wide state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSummary {
    /// Records written to the output.
    pub records: u64,
    /// Sorted blocks spilled during the split phase.
    pub blocks: usize,
    /// Block byte budget the run used.
    pub block_size: u64,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Debug, Clone)]
pub struct ExternalSorterBuilder {
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Block byte budget override. Estimated from input size and free memory when unset.
    block_size: Option<u64>,
    /// Spill file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Input/output record framing.
    framing: Framing,
    /// Record ordering.
    comparator: Comparator,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, SortError> {
        ExternalSorter::new(
            self.tmp_dir.as_deref(),
            self.block_size,
            self.rw_buf_size,
            self.framing,
            self.comparator,
        )
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Overrides the block byte budget instead of estimating it.
    pub fn with_block_size(mut self, block_size: u64) -> ExternalSorterBuilder {
        self.block_size = Some(block_size);
        return self;
    }

    /// Sets spill file read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder {
        self.rw_buf_size = Some(buf_size);
        return self;
    }

    /// Sets the input/output record framing.
    pub fn with_framing(mut self, framing: Framing) -> ExternalSorterBuilder {
        self.framing = framing;
        return self;
    }

    /// Sets the record ordering.
    pub fn with_comparator(mut self, comparator: Comparator) -> ExternalSorterBuilder {
        self.comparator = comparator;
        return self;
    }
}

impl Default for ExternalSorterBuilder {
    fn default() -> Self {
        ExternalSorterBuilder {
            tmp_dir: None,
            block_size: None,
            rw_buf_size: None,
            framing: Framing::Lines,
            comparator: Comparator::Text,
        }
    }
}

/// External sorter.
///
/// Sorts datasets larger than memory in two phases: the split phase streams
/// the input into bounded, individually sorted spill files, and the merge
/// phase recombines them through a min-priority frontier into one ordered
/// output. Spill files live in a sorter-owned temporary directory; whatever an
/// aborted run leaves behind is swept when the sorter is dropped.
pub struct ExternalSorter {
    /// Directory holding this run's spill files.
    tmp_dir: tempfile::TempDir,
    /// Block byte budget override.
    block_size: Option<u64>,
    /// Spill file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Input/output record framing.
    framing: Framing,
    /// Record ordering.
    comparator: Comparator,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `tmp_path` - Directory to be used to store temporary data. If the parameter is [`None`]
    ///   the default OS temporary directory will be used.
    /// * `block_size` - Block byte budget. If the parameter is [`None`] the budget is estimated
    ///   per run from the input size and currently free memory.
    /// * `rw_buf_size` - Spill file read/write buffer size.
    /// * `framing` - Input/output record framing.
    /// * `comparator` - Record ordering.
    pub fn new(
        tmp_path: Option<&Path>,
        block_size: Option<u64>,
        rw_buf_size: Option<usize>,
        framing: Framing,
        comparator: Comparator,
    ) -> Result<Self, SortError> {
        if let Framing::Delimited(separator) = &framing {
            if separator.is_empty() {
                return Err(SortError::Config(
                    "delimited framing requires a non-empty separator".into(),
                ));
            }
        }

        return Ok(ExternalSorter {
            tmp_dir: Self::init_tmp_directory(tmp_path)?,
            block_size,
            rw_buf_size,
            framing,
            comparator,
        });
    }

    fn init_tmp_directory(tmp_path: Option<&Path>) -> Result<tempfile::TempDir, SortError> {
        let tmp_dir = if let Some(tmp_path) = tmp_path {
            tempfile::tempdir_in(tmp_path)
        } else {
            tempfile::tempdir()
        }
        .map_err(SortError::TempDir)?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    /// Sorts `input` into `output`.
    ///
    /// Without a configured block size the budget is estimated from free
    /// memory alone, since a stream's length is unknown up front.
    pub fn sort<R, W>(&self, input: R, output: W) -> Result<SortSummary, SortError>
    where
        R: BufRead,
        W: Write,
    {
        self.run(input, output, 0)
    }

    /// Sorts the file at `input` into a newly created file at `output`.
    ///
    /// A failed run never leaves a partial result: the output file is removed
    /// before the error is returned.
    pub fn sort_file(&self, input: &Path, output: &Path) -> Result<SortSummary, SortError> {
        let input_file = fs::File::open(input).map_err(SortError::Input)?;
        let input_size = input_file.metadata().map_err(SortError::Input)?.len();
        let output_file = fs::File::create(output).map_err(SortError::Output)?;

        let result = self.run(io::BufReader::new(input_file), io::BufWriter::new(output_file), input_size);
        if result.is_err() {
            // no silent partial output
            let _ = fs::remove_file(output);
        }

        return result;
    }

    fn run<R, W>(&self, input: R, output: W, input_size: u64) -> Result<SortSummary, SortError>
    where
        R: BufRead,
        W: Write,
    {
        let block_size = match self.block_size {
            Some(block_size) => block_size,
            None => estimate_block_size(input_size, free_memory()),
        };
        log::info!("sorting with a block budget of {} bytes", block_size);

        let mut reader = RecordReader::new(input, self.framing.clone());
        let spills = split(
            &mut reader,
            self.comparator,
            block_size,
            self.tmp_dir.path(),
            self.rw_buf_size,
        )?;
        let blocks = spills.len();

        let mut writer = RecordWriter::new(output, self.framing.clone());
        let records = merge(spills, self.comparator, &mut writer, self.rw_buf_size)?;
        writer.finish().map_err(SortError::Output)?;

        log::info!("sorted {} record(s) in {} block(s)", records, blocks);

        return Ok(SortSummary {
            records,
            blocks,
            block_size,
        });
    }
}
