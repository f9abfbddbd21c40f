//! Batch assembly
//!
//! Splits the agency's ordered records into fixed-size batches. Order is
//! preserved and no record is dropped or duplicated; only the final batch
//! may be short.

use shared::{AgencyId, Batch, BetRecord};
use tracing::debug;

/// Partition `records` into batches of at most `size` records
///
/// A `size` of zero is treated as one. Zero records yield zero batches.
pub fn chunk(agency: &AgencyId, records: Vec<BetRecord>, size: usize) -> Vec<Batch> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(records.len().div_ceil(size));
    let mut current = Vec::with_capacity(size);

    for record in records {
        current.push(record);

        if current.len() == size {
            push_batch(&mut batches, agency, std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        push_batch(&mut batches, agency, current);
    }

    debug!(
        batch_count = batches.len(),
        max_size = size,
        "Created batches"
    );

    batches
}

fn push_batch(batches: &mut Vec<Batch>, agency: &AgencyId, records: Vec<BetRecord>) {
    let index = batches.len();
    // records is never empty here
    if let Ok(batch) = Batch::new(index, agency.clone(), records) {
        batches.push(batch);
    }
}
