//! 🎬 *[camera pans across a dimly lit bus depot]*
//! 🎬 *[dramatic orchestral music swells]*
//! 🎬 "In a world where telemetry piles up by the million..."
//! 🎬 "One supervisor dared to load it all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor module: part middle manager, part that one colleague who
//! insists on doing the paperwork before touching anything.
//!
//! Per trip, strictly in order:
//!
//! ```text
//! read + validate input → resolve bus/route → register trip → batch → dispatch → verdict
//! ```
//!
//! and after the last trip, partition maintenance. Only the dispatch step runs
//! in parallel, and trip N+1 never starts before trip N's batches are all accounted for.
//!
//! ⚠️ DO NOT MAKE THE WORKERS PUB. 🔒 Like Fight Club, but for async tasks.

mod dispatcher;
mod maintenance;
mod registrar;
mod workers;

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tracing::{Instrument, error, info, info_span, warn};

use crate::app_config::{RuntimeConfig, TripErrorPolicy};
use crate::backends::{Source, SourceBackend, StoreBackend};
use crate::batcher::create_batches;
use crate::common::{TelemetrySample, TripMetadata};
use crate::error::IngestError;
use crate::mapping::{trip_interval, validate_samples};
use crate::progress::IngestProgress;
use dispatcher::{TelemetryReport, dispatch};
use registrar::{ReferenceResolver, Registration, register_trip};

/// 📋 What a successful run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub trips_total: usize,
    pub trips_loaded: usize,
    pub trips_skipped: usize,
    pub batches_committed: u64,
    pub rows_committed: u64,
    pub elapsed: Duration,
}

/// 🎫 How one trip ended, when it didn't end in an error.
#[derive(Debug)]
enum TripOutcome {
    Loaded(TelemetryReport),
    Skipped,
}

/// 📦 The Supervisor: because even async tasks need someone hovering over them
/// asking "is it done yet?" every 5 milliseconds.
#[derive(Debug)]
pub(crate) struct Supervisor {
    store: StoreBackend,
    runtime: RuntimeConfig,
}

impl Supervisor {
    pub(crate) fn new(store: StoreBackend, runtime: RuntimeConfig) -> Self {
        Self { store, runtime }
    }

    /// 🚀 Load every trip the source knows about, then arrange partitions.
    ///
    /// Errors come back as [`IngestError`] inside `anyhow`, so callers can
    /// `downcast_ref` for the details.
    pub(crate) async fn run(&self, source: &mut SourceBackend) -> Result<RunSummary> {
        let trips = source
            .trips()
            .await
            .context("💀 could not read the trip metadata")?;
        info!(
            trips = trips.len(),
            batch_size = self.runtime.batch_size.get(),
            workers = self.runtime.worker_count.get(),
            "🚀 ingestion starting"
        );

        let mut progress = IngestProgress::new(trips.len() as u64, self.runtime.show_progress);
        let mut resolver = ReferenceResolver::new();
        let mut summary = RunSummary {
            trips_total: trips.len(),
            ..RunSummary::default()
        };
        let mut failed_trips = Vec::new();

        for trip in &trips {
            let span = info_span!("trip", trip = %trip.name);
            let outcome = self
                .ingest_trip(source, &mut resolver, trip, &mut progress)
                .instrument(span)
                .await;
            progress.finish_trip();

            match outcome {
                Ok(TripOutcome::Loaded(report)) => {
                    summary.trips_loaded += 1;
                    summary.batches_committed += report.batches as u64;
                    summary.rows_committed += report.rows;
                }
                Ok(TripOutcome::Skipped) => summary.trips_skipped += 1,
                Err(err)
                    if err.is_run_fatal() || self.runtime.on_trip_error == TripErrorPolicy::Abort =>
                {
                    error!(trip = %trip.name, error = %err, "💀 aborting the run");
                    progress.abandon();
                    return Err(err.into());
                }
                Err(err) => {
                    warn!(
                        trip = %trip.name,
                        error = %format!("{:#}", anyhow::Error::from(err)),
                        "⚠️ trip failed; continuing with the next one"
                    );
                    failed_trips.push(trip.name.clone());
                }
            }
        }

        if let Err(err) = maintenance::make_partitions(&self.store).await {
            progress.abandon();
            return Err(err.into());
        }
        progress.finish();

        if !failed_trips.is_empty() {
            return Err(IngestError::TripsFailed {
                trips: failed_trips,
            }
            .into());
        }

        summary.elapsed = progress.elapsed();
        info!(
            loaded = summary.trips_loaded,
            skipped = summary.trips_skipped,
            rows = summary.rows_committed,
            batches = summary.batches_committed,
            "🏁 ingestion complete"
        );
        Ok(summary)
    }

    async fn ingest_trip(
        &self,
        source: &mut SourceBackend,
        resolver: &mut ReferenceResolver,
        trip: &TripMetadata,
        progress: &mut IngestProgress,
    ) -> Result<TripOutcome, IngestError> {
        // -- 📖 input problems surface here, before the database hears about this trip
        let (samples, interval) = read_trip_input(source, trip)
            .await
            .map_err(|cause| IngestError::Input {
                trip: trip.name.clone(),
                source: cause,
            })?;

        let registered = match register_trip(
            &self.store,
            resolver,
            trip,
            interval,
            self.runtime.existing_trip,
            samples.len(),
        )
        .await?
        {
            Registration::Ready(registered) => registered,
            Registration::Skipped => return Ok(TripOutcome::Skipped),
        };

        let sample_count = samples.len();
        let batches = create_batches(&registered, samples, self.runtime.batch_size);
        info!(samples = sample_count, batches = batches.len(), "📦 dispatching telemetry");
        progress.start_trip(&trip.name, batches.len());

        let report = dispatch(&self.store, &self.runtime, &trip.name, batches, progress).await?;
        Ok(TripOutcome::Loaded(report))
    }
}

/// 📖 Parse the trip's samples and check every timestamp on the way.
async fn read_trip_input(
    source: &mut SourceBackend,
    trip: &TripMetadata,
) -> Result<(Vec<TelemetrySample>, (NaiveDateTime, NaiveDateTime))> {
    let interval = trip_interval(trip)?;
    let samples = source.telemetry(trip).await?;
    validate_samples(&samples)?;
    Ok((samples, interval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::ExistingTripPolicy;
    use crate::backends::{InMemorySource, InMemoryStore};
    use crate::test_support::{sample, samples, trip};
    use std::num::NonZeroUsize;

    fn runtime(batch_size: usize) -> RuntimeConfig {
        RuntimeConfig {
            batch_size: NonZeroUsize::new(batch_size).expect("non-zero"),
            worker_count: NonZeroUsize::new(4).expect("non-zero"),
            queue_capacity: NonZeroUsize::new(2).expect("non-zero"),
            show_progress: false,
            ..RuntimeConfig::default()
        }
    }

    fn supervisor(store: &InMemoryStore, runtime: RuntimeConfig) -> Supervisor {
        Supervisor::new(StoreBackend::InMemory(store.clone()), runtime)
    }

    fn ingest_error(err: &anyhow::Error) -> &IngestError {
        err.downcast_ref::<IngestError>()
            .expect("💀 the run should fail with an IngestError")
    }

    #[tokio::test]
    async fn the_one_where_2500_rows_ride_in_three_batches() -> Result<()> {
        let store = InMemoryStore::with_max_connections(15);
        let mut source = SourceBackend::InMemory(
            InMemorySource::new().with_trip(trip("T1", "B1", "R1"), samples(2500)),
        );

        let summary = supervisor(&store, runtime(1000)).run(&mut source).await?;

        assert_eq!(summary.trips_loaded, 1);
        assert_eq!(summary.batches_committed, 3);
        assert_eq!(summary.rows_committed, 2500);
        assert_eq!(store.bus_count().await, 1);
        assert_eq!(store.route_count().await, 1);
        let trips = store.trips().await;
        assert_eq!(trips.len(), 1);
        let rows = store.telemetry_rows().await;
        assert_eq!(rows.len(), 2500);
        assert!(rows.iter().all(|r| r.trip_id == trips[0].id.0));
        assert!(rows.iter().all(|r| r.bus_route_id == trips[0].row.route_id.0));
        assert_eq!(store.maintenance_calls().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_blank_fields_arrive_as_nothing_at_all() -> Result<()> {
        let mut gappy = sample(1_609_488_000);
        gappy.gnss_altitude = None;
        gappy.itcs_stop_name = None;
        let store = InMemoryStore::with_max_connections(2);
        let mut source = SourceBackend::InMemory(
            InMemorySource::new().with_trip(trip("T1", "B1", "R1"), vec![gappy]),
        );

        supervisor(&store, runtime(1000)).run(&mut source).await?;

        let rows = store.telemetry_rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].gnss_altitude, None);
        assert_eq!(rows[0].itcs_stop_name, None);
        assert_eq!(rows[0].gnss_latitude, Some(47.3769_f64 as f32));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_two_trips_share_a_bus() -> Result<()> {
        let store = InMemoryStore::with_max_connections(4);
        let mut source = SourceBackend::InMemory(
            InMemorySource::new()
                .with_trip(trip("T1", "B1", "R1"), samples(10))
                .with_trip(trip("T2", "B1", "R2"), samples(10)),
        );

        let summary = supervisor(&store, runtime(4)).run(&mut source).await?;

        assert_eq!(summary.trips_loaded, 2);
        assert_eq!(store.bus_count().await, 1);
        assert_eq!(store.route_count().await, 2);
        let trips = store.trips().await;
        assert_eq!(trips[0].row.bus_id, trips[1].row.bus_id);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_failed_batch_names_its_trip_and_number() {
        let store = InMemoryStore::with_max_connections(4);
        store.fail_batch("T1", 2).await;
        let mut source = SourceBackend::InMemory(
            InMemorySource::new()
                .with_trip(trip("T1", "B1", "R1"), samples(2500))
                .with_trip(trip("T2", "B1", "R1"), samples(10)),
        );

        let err = supervisor(&store, runtime(1000))
            .run(&mut source)
            .await
            .expect_err("batch 2 of T1 was rigged to fail");

        let IngestError::Telemetry {
            trip,
            first,
            total_batches,
            ..
        } = ingest_error(&err)
        else {
            panic!("💀 expected a telemetry error, got {err:#}");
        };
        assert_eq!(trip, "T1");
        assert_eq!((first.batch_number, *total_batches), (2, 3));
        let chain = format!("{err:#}");
        assert!(chain.contains("batch 2/3 of trip 'T1' failed"), "got: {chain}");

        // -- ✅ siblings 1 and 3 committed; T2 was never started
        assert_eq!(store.telemetry_rows().await.len(), 1500);
        assert_eq!(store.trips().await.len(), 1);
        assert_eq!(store.maintenance_calls().await, 0);
    }

    #[tokio::test]
    async fn the_one_where_telemetry_failures_abort_even_under_continue() {
        let store = InMemoryStore::with_max_connections(4);
        store.fail_batch("T1", 1).await;
        let mut source = SourceBackend::InMemory(
            InMemorySource::new()
                .with_trip(trip("T1", "B1", "R1"), samples(5))
                .with_trip(trip("T2", "B1", "R1"), samples(5)),
        );
        let runtime = RuntimeConfig {
            on_trip_error: TripErrorPolicy::Continue,
            ..runtime(10)
        };

        let err = supervisor(&store, runtime)
            .run(&mut source)
            .await
            .expect_err("a partial trip stops the run regardless of policy");
        assert!(matches!(ingest_error(&err), IngestError::Telemetry { .. }));
        assert_eq!(store.trips().await.len(), 1, "T2 never registered");
    }

    #[tokio::test]
    async fn the_one_where_a_missing_file_stops_the_run_by_default() {
        let store = InMemoryStore::with_max_connections(4);
        let mut source = SourceBackend::InMemory(
            InMemorySource::new()
                .with_trip_missing_telemetry(trip("T1", "B1", "R1"))
                .with_trip(trip("T2", "B1", "R1"), samples(5)),
        );

        let err = supervisor(&store, runtime(10))
            .run(&mut source)
            .await
            .expect_err("abort is the default");
        assert!(matches!(ingest_error(&err), IngestError::Input { trip, .. } if trip == "T1"));
        assert_eq!(store.bus_count().await, 0, "input errors come before any database work");
        assert!(store.trips().await.is_empty());
    }

    #[tokio::test]
    async fn the_one_where_continue_loads_the_rest_and_then_tells_on_the_failures() {
        let store = InMemoryStore::with_max_connections(4);
        let mut backwards = trip("T3", "B2", "R1");
        backwards.end_time_unix = backwards.start_time_unix - 60;
        let mut source = SourceBackend::InMemory(
            InMemorySource::new()
                .with_trip_missing_telemetry(trip("T1", "B1", "R1"))
                .with_trip(trip("T2", "B1", "R1"), samples(5))
                .with_trip(backwards, samples(5)),
        );
        let runtime = RuntimeConfig {
            on_trip_error: TripErrorPolicy::Continue,
            ..runtime(10)
        };

        let err = supervisor(&store, runtime)
            .run(&mut source)
            .await
            .expect_err("two trips failed");

        let IngestError::TripsFailed { trips } = ingest_error(&err) else {
            panic!("💀 expected the roll call, got {err:#}");
        };
        assert_eq!(trips, &vec!["T1".to_string(), "T3".to_string()]);
        assert_eq!(store.telemetry_rows().await.len(), 5, "T2 still loaded");
        assert_eq!(store.maintenance_calls().await, 1, "maintenance still ran");
    }

    #[tokio::test]
    async fn the_one_where_maintenance_fails_after_the_data_is_safe() {
        let store = InMemoryStore::with_max_connections(4);
        store.fail_maintenance().await;
        let mut source = SourceBackend::InMemory(
            InMemorySource::new().with_trip(trip("T1", "B1", "R1"), samples(20)),
        );

        let err = supervisor(&store, runtime(10))
            .run(&mut source)
            .await
            .expect_err("maintenance was rigged to fail");
        assert!(matches!(ingest_error(&err), IngestError::Maintenance { .. }));
        assert_eq!(store.telemetry_rows().await.len(), 20, "committed data stays committed");
    }

    #[tokio::test]
    async fn the_one_where_a_rerun_with_skip_changes_nothing() -> Result<()> {
        let store = InMemoryStore::with_max_connections(4);
        let load = || {
            SourceBackend::InMemory(
                InMemorySource::new()
                    .with_trip(trip("T1", "B1", "R1"), samples(30))
                    .with_trip(trip("T2", "B2", "R1"), samples(30)),
            )
        };
        let skip = RuntimeConfig {
            existing_trip: ExistingTripPolicy::Skip,
            ..runtime(7)
        };

        supervisor(&store, skip.clone()).run(&mut load()).await?;
        let summary = supervisor(&store, skip).run(&mut load()).await?;

        assert_eq!(summary.trips_skipped, 2);
        assert_eq!(summary.rows_committed, 0);
        assert_eq!(store.bus_count().await, 2);
        assert_eq!(store.route_count().await, 1);
        assert_eq!(store.trips().await.len(), 2);
        assert_eq!(store.telemetry_rows().await.len(), 60);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_skip_will_not_paper_over_a_partial_trip() -> Result<()> {
        let store = InMemoryStore::with_max_connections(4);
        let load = || {
            SourceBackend::InMemory(
                InMemorySource::new().with_trip(trip("T1", "B1", "R1"), samples(2500)),
            )
        };
        let skip = RuntimeConfig {
            existing_trip: ExistingTripPolicy::Skip,
            ..runtime(1000)
        };

        store.fail_batch("T1", 2).await;
        supervisor(&store, skip.clone())
            .run(&mut load())
            .await
            .expect_err("batch 2 of T1 was rigged to fail");
        assert_eq!(store.telemetry_rows().await.len(), 1500);

        let err = supervisor(&store, skip)
            .run(&mut load())
            .await
            .expect_err("1500 of 2500 rows is not a loaded trip");
        let IngestError::TripRegistration { trip, .. } = ingest_error(&err) else {
            panic!("💀 expected a registration error, got {err:#}");
        };
        assert_eq!(trip, "T1");
        let chain = format!("{err:#}");
        assert!(chain.contains("1500 telemetry rows stored, 2500 in the input"), "got: {chain}");
        assert_eq!(store.telemetry_rows().await.len(), 1500, "skip never writes");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_replace_swaps_the_telemetry_wholesale() -> Result<()> {
        let store = InMemoryStore::with_max_connections(4);
        let replace = RuntimeConfig {
            existing_trip: ExistingTripPolicy::Replace,
            ..runtime(10)
        };

        let mut first = SourceBackend::InMemory(
            InMemorySource::new().with_trip(trip("T1", "B1", "R1"), samples(30)),
        );
        supervisor(&store, replace.clone()).run(&mut first).await?;
        let mut second = SourceBackend::InMemory(
            InMemorySource::new().with_trip(trip("T1", "B1", "R1"), samples(12)),
        );
        let summary = supervisor(&store, replace).run(&mut second).await?;

        assert_eq!(summary.rows_committed, 12);
        assert_eq!(store.trips().await.len(), 1);
        assert_eq!(store.telemetry_rows().await.len(), 12);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_trip_with_no_samples_still_gets_its_row() -> Result<()> {
        let store = InMemoryStore::with_max_connections(2);
        let mut source = SourceBackend::InMemory(
            InMemorySource::new().with_trip(trip("T1", "B1", "R1"), Vec::new()),
        );

        let summary = supervisor(&store, runtime(10)).run(&mut source).await?;

        assert_eq!(summary.trips_loaded, 1);
        assert_eq!(summary.batches_committed, 0);
        assert_eq!(store.trips().await.len(), 1);
        assert!(store.telemetry_rows().await.is_empty());
        Ok(())
    }
}
