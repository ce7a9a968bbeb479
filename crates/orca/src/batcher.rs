// ai
//! ✂️ The Batcher: slices one trip's telemetry into fixed-size, independently loadable chunks.
//!
//! Pure function. Same input, same boundaries, every time. No I/O, no clock,
//! no randomness, no feelings.
//!
//! ```text
//! 2500 samples, batch_size 1000
//!   → [1/3: 1000] [2/3: 1000] [3/3: 500]
//! ```
//!
//! 🧠 Knowledge graph: batches own their samples (moved, not cloned) because a
//! batch is consumed exactly once by exactly one worker. The trip's `Vec` is
//! drained in order, so concatenating the batches gives back the input.

use std::num::NonZeroUsize;

use crate::common::{RegisteredTrip, TelemetryBatch, TelemetrySample};

/// 🔢 ceil(samples / batch_size). Zero samples means zero batches.
pub fn batch_count(samples: usize, batch_size: NonZeroUsize) -> usize {
    samples.div_ceil(batch_size.get())
}

/// ✂️ Cut `samples` into batches of `batch_size`, numbered from 1. The last one may be short.
pub fn create_batches(
    trip: &RegisteredTrip,
    samples: Vec<TelemetrySample>,
    batch_size: NonZeroUsize,
) -> Vec<TelemetryBatch> {
    let total_batches = batch_count(samples.len(), batch_size);
    let mut remaining = samples.into_iter();

    (1..=total_batches)
        .map(|batch_number| TelemetryBatch {
            trip_id: trip.id,
            trip_name: trip.name.clone(),
            batch_number,
            total_batches,
            samples: remaining.by_ref().take(batch_size.get()).collect(),
        })
        .collect()
}
