// ai
//! 📮 The Dispatcher: feeds one trip's batches to a pool of workers and tallies the verdicts.
//!
//! ```text
//!                 ┌─ worker 0 ─┐
//! feeder ─[jobs]──┼─ worker 1 ─┼──[results]── collector ─→ pass / fail
//!   (bounded)     └─ worker n ─┘   (one per batch)
//! ```
//!
//! 🧠 Knowledge graph:
//! - The job queue is bounded by `queue_capacity`; the feeder waits when it's full.
//! - The results queue holds one slot per batch, so a worker never blocks on reporting.
//! - Workers own their own `Sender<BatchOutcome>` clones. The collector's `recv`
//!   returns `Err` only once every worker has dropped its sender, meaning every
//!   worker is done (or dead).
//! - A batch with no outcome (its worker panicked) is reported as a failure.
//!   Nothing goes missing quietly.

use std::collections::HashSet;

use anyhow::anyhow;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::workers::{BatchOutcome, TelemetryWorker, Worker};
use crate::app_config::RuntimeConfig;
use crate::backends::{Store, StoreBackend};
use crate::common::TelemetryBatch;
use crate::error::{BatchFailure, IngestError};
use crate::progress::IngestProgress;

/// 📋 What a fully successful telemetry load amounted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TelemetryReport {
    pub batches: usize,
    pub rows: u64,
}

/// 🚀 Load every batch of one trip. `Ok` only if every single batch committed.
pub(crate) async fn dispatch(
    store: &StoreBackend,
    runtime: &RuntimeConfig,
    trip_name: &str,
    batches: Vec<TelemetryBatch>,
    progress: &mut IngestProgress,
) -> Result<TelemetryReport, IngestError> {
    let total_batches = batches.len();
    if total_batches == 0 {
        debug!("📭 no telemetry rows; nothing to dispatch");
        return Ok(TelemetryReport::default());
    }

    let worker_count = effective_workers(runtime, total_batches, store.max_connections());

    let (job_tx, job_rx) = async_channel::bounded::<TelemetryBatch>(runtime.queue_capacity.get());
    let (result_tx, result_rx) = async_channel::bounded::<BatchOutcome>(total_batches);

    let handles: Vec<_> = (0..worker_count)
        .map(|id| {
            TelemetryWorker::new(id, job_rx.clone(), result_tx.clone(), store.clone()).start()
        })
        .collect();
    // -- 🔒 only the workers may hold these now, or the channels never close
    drop(job_rx);
    drop(result_tx);

    let feeder = tokio::spawn(async move {
        for batch in batches {
            if job_tx.send(batch).await.is_err() {
                // -- 💀 every worker is gone; the missing outcomes will say so
                break;
            }
        }
        // -- 📪 job_tx drops here, closing the queue
    });

    let mut outcomes: Vec<BatchOutcome> = Vec::with_capacity(total_batches);
    while let Ok(outcome) = result_rx.recv().await {
        if let Ok(rows) = &outcome.result {
            progress.record_batch(*rows);
        }
        outcomes.push(outcome);
    }

    for (worker, joined) in join_all(handles).await.into_iter().enumerate() {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(worker, error = %format!("{err:#}"), "⚠️ worker stopped early"),
            Err(join_err) => error!(worker, error = %join_err, "💀 worker task died"),
        }
    }
    if let Err(join_err) = feeder.await {
        error!(error = %join_err, "💀 batch feeder task died");
    }

    collect_verdict(trip_name, total_batches, outcomes)
}

/// 🧮 One worker per batch at most, and never more workers than pooled sessions.
///
/// A worker with no session to hold would sit in `acquire` until the pool's
/// timeout failed its batch, so the surplus is never started.
fn effective_workers(
    runtime: &RuntimeConfig,
    total_batches: usize,
    max_connections: u32,
) -> usize {
    let requested = runtime.worker_count.get();
    let pool_size = (max_connections as usize).max(1);
    if requested > pool_size {
        warn!(
            workers = requested,
            max_connections,
            "⚠️ more workers than pooled connections; running with one worker per connection"
        );
    }
    requested.min(pool_size).min(total_batches)
}

/// ⚖️ Turns the pile of outcomes into one verdict for the trip.
fn collect_verdict(
    trip_name: &str,
    total_batches: usize,
    outcomes: Vec<BatchOutcome>,
) -> Result<TelemetryReport, IngestError> {
    let reported: HashSet<usize> = outcomes.iter().map(|o| o.batch_number).collect();
    let mut report = TelemetryReport::default();
    let mut failures = Vec::new();

    for outcome in outcomes {
        match outcome.result {
            Ok(rows) => {
                report.batches += 1;
                report.rows += rows;
            }
            Err(cause) => failures.push(BatchFailure {
                trip: trip_name.to_string(),
                batch_number: outcome.batch_number,
                total_batches: outcome.total_batches,
                cause,
            }),
        }
    }
    for batch_number in (1..=total_batches).filter(|n| !reported.contains(n)) {
        failures.push(BatchFailure {
            trip: trip_name.to_string(),
            batch_number,
            total_batches,
            cause: anyhow!("💀 no outcome was reported; the worker holding this batch died"),
        });
    }

    failures.sort_by_key(|f| f.batch_number);
    let failed = failures.len();
    let mut failures = failures.into_iter();
    match failures.next() {
        None => {
            info!(batches = report.batches, rows = report.rows, "✅ all batches committed");
            Ok(report)
        }
        Some(first) => {
            error!(
                failed,
                total_batches,
                first_batch = first.batch_number,
                committed = report.batches,
                "💀 trip is partially loaded"
            );
            Err(IngestError::Telemetry {
                trip: trip_name.to_string(),
                failed,
                total_batches,
                first,
                rest: failures.collect(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::ExistingTripPolicy;
    use crate::backends::{InMemoryStore, TripRegistration};
    use crate::batcher::create_batches;
    use crate::common::RegisteredTrip;
    use crate::mapping::{TripRow, trip_interval};
    use crate::test_support::{samples, trip};
    use std::num::NonZeroUsize;
    use std::sync::Arc;
    use std::time::Duration;

    fn runtime(workers: usize, queue: usize) -> RuntimeConfig {
        RuntimeConfig {
            worker_count: NonZeroUsize::new(workers).expect("non-zero"),
            queue_capacity: NonZeroUsize::new(queue).expect("non-zero"),
            show_progress: false,
            ..RuntimeConfig::default()
        }
    }

    async fn registered(store: &InMemoryStore, name: &str) -> RegisteredTrip {
        let meta = trip(name, "B1", "R1");
        let bus_id = store.upsert_bus("B1").await.expect("bus");
        let route_id = store.upsert_route("R1").await.expect("route");
        let interval = trip_interval(&meta).expect("interval");
        let row = TripRow::new(&meta, bus_id, route_id, interval);
        let Ok(TripRegistration::Created(id)) =
            store.register_trip(&row, ExistingTripPolicy::Fail).await
        else {
            panic!("💀 a fresh name should be created");
        };
        RegisteredTrip {
            id,
            name: Arc::from(name),
            bus_id,
            route_id,
        }
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).expect("non-zero")
    }

    #[tokio::test]
    async fn the_one_where_every_batch_lands() {
        let store = InMemoryStore::with_max_connections(4);
        let trip = registered(&store, "T1").await;
        let batches = create_batches(&trip, samples(2500), size(1000));
        let mut progress = IngestProgress::new(1, false);

        let report = dispatch(
            &StoreBackend::InMemory(store.clone()),
            &runtime(3, 2),
            "T1",
            batches,
            &mut progress,
        )
        .await
        .expect("💀 nothing was rigged to fail");

        assert_eq!(report, TelemetryReport { batches: 3, rows: 2500 });
        assert_eq!(progress.rows(), 2500);
        assert_eq!(store.telemetry_rows().await.len(), 2500);
    }

    #[tokio::test]
    async fn the_one_where_one_bad_batch_fails_the_trip_but_not_its_siblings() {
        let store = InMemoryStore::with_max_connections(4);
        let trip = registered(&store, "T1").await;
        store.fail_batch("T1", 2).await;
        let batches = create_batches(&trip, samples(2500), size(1000));
        let mut progress = IngestProgress::new(1, false);

        let err = dispatch(
            &StoreBackend::InMemory(store.clone()),
            &runtime(3, 1),
            "T1",
            batches,
            &mut progress,
        )
        .await
        .expect_err("batch 2 was rigged to fail");

        let IngestError::Telemetry {
            trip,
            failed,
            total_batches,
            first,
            rest,
        } = err
        else {
            panic!("💀 expected a telemetry error");
        };
        assert_eq!(trip, "T1");
        assert_eq!((failed, total_batches), (1, 3));
        assert_eq!(first.batch_number, 2);
        assert!(rest.is_empty());
        // -- ✅ batches 1 and 3 still committed: 1000 + 500
        assert_eq!(store.telemetry_rows().await.len(), 1500);
        assert_eq!(progress.batches(), 2);
    }

    #[tokio::test]
    async fn the_one_where_the_pool_is_never_oversubscribed() {
        let store =
            InMemoryStore::with_max_connections(3).with_batch_latency(Duration::from_millis(15));
        let trip = registered(&store, "T1").await;
        let batches = create_batches(&trip, samples(400), size(10));
        let mut progress = IngestProgress::new(1, false);

        let report = dispatch(
            &StoreBackend::InMemory(store.clone()),
            &runtime(10, 5),
            "T1",
            batches,
            &mut progress,
        )
        .await
        .expect("💀 nothing was rigged to fail");

        assert_eq!(report.batches, 40);
        assert!(store.peak_sessions() <= 3, "peak was {}", store.peak_sessions());
        assert!(store.peak_sessions() >= 2, "workers should overlap on the pool");
    }

    #[test]
    fn the_one_where_the_workforce_shrinks_to_fit_the_pool() {
        // -- 🔒 ten workers, three sessions: seven of them would only ever time out
        assert_eq!(effective_workers(&runtime(10, 5), 40, 3), 3);
        // -- 📦 fewer batches than anything else wins
        assert_eq!(effective_workers(&runtime(10, 5), 2, 15), 2);
        assert_eq!(effective_workers(&runtime(4, 5), 40, 15), 4);
    }

    #[tokio::test]
    async fn the_one_where_an_empty_trip_dispatches_nothing() {
        let store = InMemoryStore::with_max_connections(1);
        let mut progress = IngestProgress::new(1, false);
        let report = dispatch(
            &StoreBackend::InMemory(store),
            &runtime(2, 2),
            "T1",
            Vec::new(),
            &mut progress,
        )
        .await
        .expect("💀 nothing to fail");
        assert_eq!(report, TelemetryReport::default());
    }

    #[test]
    fn the_one_where_a_silent_batch_is_counted_as_failed() {
        let outcomes = vec![
            BatchOutcome {
                batch_number: 3,
                total_batches: 3,
                result: Err(anyhow!("boom")),
            },
            BatchOutcome {
                batch_number: 1,
                total_batches: 3,
                result: Ok(10),
            },
        ];

        let err = collect_verdict("T1", 3, outcomes).expect_err("batch 2 never answered");
        let numbers: Vec<usize> = err.batch_failures().iter().map(|f| f.batch_number).collect();
        assert_eq!(numbers, vec![2, 3], "failures are listed lowest batch first");
        assert!(err.to_string().contains("2 of 3 batches"));
    }
}
