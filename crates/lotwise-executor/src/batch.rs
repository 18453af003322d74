//! Lot batching.
//!
//! `floor(total / max)` full batches, then one remainder batch if
//! `total % max > 0`. Pure and deterministic.

use crate::error::{ExecutorError, ExecutorResult};

/// Split `total_lots` into batches of at most `max_batch_size` lots.
pub fn split_lots(total_lots: u32, max_batch_size: u32) -> ExecutorResult<Vec<u32>> {
    if total_lots == 0 {
        return Err(ExecutorError::InvalidBatchInput(
            "total_lots must be positive".to_string(),
        ));
    }
    if max_batch_size == 0 {
        return Err(ExecutorError::InvalidBatchInput(
            "max_batch_size must be positive".to_string(),
        ));
    }

    let full = total_lots / max_batch_size;
    let remainder = total_lots % max_batch_size;

    let mut batches = vec![max_batch_size; full as usize];
    if remainder > 0 {
        batches.push(remainder);
    }
    Ok(batches)
}
