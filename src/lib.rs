//! `spillsort` is an external merge sort for flat text data.
//!
//! External sorting handles datasets that do not fit into the main memory (RAM) of a computer.
//! Sorting is achieved in two passes. During the first pass the input is streamed into blocks
//! that each fit in RAM, every block is sorted in memory and spilled to a temporary file. During
//! the second pass the sorted spill files are merged together through a bounded-memory k-way
//! merge. For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! `spillsort` supports the following features:
//!
//! * **Two record framings:**
//!   newline-delimited records or tokens separated by a delimiter string on one line; the output
//!   is produced in the same framing as the input.
//! * **Pluggable ordering:**
//!   whole-record lexical order, or numeric order by the first comma-separated field of each
//!   record; numeric parse failures abort the run before any output is produced.
//! * **Bounded memory:**
//!   the in-memory block budget is estimated from the input size and currently free memory,
//!   clamped so a run neither thrashes memory nor exceeds open-file limits, and can be
//!   overridden explicitly.
//! * **Eager storage reclamation:**
//!   each spill file is deleted as soon as it is drained during the merge, and the sorter's
//!   temporary directory sweeps up anything an aborted run leaves behind.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use spillsort::{Comparator, ExternalSorterBuilder, Framing};
//!
//! let sorter = ExternalSorterBuilder::new()
//!     .with_tmp_dir(Path::new("./"))
//!     .with_framing(Framing::Lines)
//!     .with_comparator(Comparator::Numeric)
//!     .build()
//!     .unwrap();
//!
//! let summary = sorter
//!     .sort_file(Path::new("input.txt"), Path::new("output.txt"))
//!     .unwrap();
//!
//! println!("sorted {} records in {} blocks", summary.records, summary.blocks);
//! ```

pub mod estimate;
pub mod merge;
pub mod record;
pub mod sort;
pub mod source;
pub mod split;

pub use record::{Comparator, Framing, Key, ParseError, Record, RecordReader, RecordWriter};
pub use sort::{ExternalSorter, ExternalSorterBuilder, SortError, SortSummary};
pub use source::RecordSource;
