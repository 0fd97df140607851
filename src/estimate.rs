//! Block size estimation.

use log;
use sysinfo;

/// Cap on the number of spill files a single run may create, so the merge
/// phase stays well below typical open-file-descriptor limits.
pub const MAX_SPILL_FILES: u64 = 4096;

/// Lower clamp on the block budget. Smaller blocks multiply spill files
/// without saving meaningful memory.
pub const MIN_BLOCK_BYTES: u64 = 1024 * 1024;

/// Upper clamp on the block budget.
pub const MAX_BLOCK_BYTES: u64 = 1024 * 1024 * 1024;

/// Fraction of currently free memory a block is allowed to occupy, in percent.
pub const FREE_MEMORY_PERCENT: u64 = 30;

/// Approximate per-record heap overhead used when accumulating a block
/// (string header, allocator slack, vector slot).
pub const RECORD_OVERHEAD: u64 = 40;

/// Estimates the block budget for splitting `input_size` bytes of input.
///
/// The naive budget targets at most [`MAX_SPILL_FILES`] spill files, clamped
/// into `[MIN_BLOCK_BYTES, MAX_BLOCK_BYTES]` and then capped at
/// [`FREE_MEMORY_PERCENT`] of `free_memory`. The memory cap is advisory:
/// when it bites, a warning is logged and the reduced budget is returned.
/// Never returns zero.
pub fn estimate_block_size(input_size: u64, free_memory: u64) -> u64 {
    let budget = (input_size / MAX_SPILL_FILES).clamp(MIN_BLOCK_BYTES, MAX_BLOCK_BYTES);

    let memory_cap = free_memory / 100 * FREE_MEMORY_PERCENT;
    if budget > memory_cap {
        log::warn!(
            "block budget {} exceeds {}% of free memory, reducing to {}; the run may be slow or fail under memory pressure",
            budget,
            FREE_MEMORY_PERCENT,
            memory_cap,
        );
        return memory_cap.max(1);
    }

    return budget;
}

/// Approximate in-memory cost of one record, charged against the block budget
/// during accumulation. Deliberately pessimistic: raw bytes alone undercount
/// the in-memory representation.
pub fn record_cost(record: &str) -> u64 {
    2 * record.len() as u64 + RECORD_OVERHEAD
}

/// Currently available memory in bytes.
pub fn free_memory() -> u64 {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    system.available_memory()
}
