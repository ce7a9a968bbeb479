// ai
//! 🔌 Backends: where the real I/O happens.
//!
//! 🚰 Sources pour trips and telemetry out of the data directory. 🗄️ Stores
//! swallow them into tables. Between the two sits the supervisor, and between
//! the supervisor and madness sits `anyhow`.
//!
//! 🎭 This module is the casting agency. Need to read a folder of CSVs? Write to
//! Postgres? Pretend to write to Postgres so a test can count rows in RAM?
//! We've got a backend for that.
//!
//! 🧠 Knowledge graph:
//! - [`Source`] + [`SourceBackend`]: trip metadata and per-trip samples.
//!   `Csv` in production, `InMemory` in tests.
//! - [`Store`] + [`StoreBackend`]: upserts, trip registration, one-batch-one-transaction
//!   telemetry inserts, partition maintenance. `Postgres` for real, `InMemory` for
//!   dry runs and tests. Cloning a `StoreBackend` clones a handle, never the data.
//! - Configs live beside the backend that reads them and are re-exported here.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::Result;
use async_trait::async_trait;

use crate::app_config::{ExistingTripPolicy, StoreConfig};
use crate::common::{BusId, RouteId, TelemetryBatch, TelemetrySample, TripId, TripMetadata};
use crate::mapping::TripRow;

mod common_config;
mod file;
mod in_mem;
mod postgres;

pub use common_config::PoolConfig;
pub use in_mem::InMemoryStoreConfig;
pub use postgres::PostgresStoreConfig;

pub(crate) use file::CsvDirSource;
#[cfg(test)]
pub(crate) use in_mem::InMemorySource;
pub(crate) use in_mem::InMemoryStore;
pub(crate) use postgres::PostgresStore;

// ===== Source Trait and Backend Enum =====

/// 🚰 Where trips come from.
///
/// # Contract
/// - `trips` lists every trip once, in the order they should be loaded.
/// - `telemetry` returns one trip's samples in recorded order, fully parsed.
///   A malformed row fails the whole call; half a trip is worse than none.
#[async_trait]
pub(crate) trait Source: std::fmt::Debug + Send {
    async fn trips(&mut self) -> Result<Vec<TripMetadata>>;
    async fn telemetry(&mut self, trip: &TripMetadata) -> Result<Vec<TelemetrySample>>;
}

#[derive(Debug)]
pub(crate) enum SourceBackend {
    Csv(CsvDirSource),
    #[cfg(test)]
    InMemory(InMemorySource),
}

#[async_trait]
impl Source for SourceBackend {
    async fn trips(&mut self) -> Result<Vec<TripMetadata>> {
        match self {
            SourceBackend::Csv(source) => source.trips().await,
            #[cfg(test)]
            SourceBackend::InMemory(source) => source.trips().await,
        }
    }

    async fn telemetry(&mut self, trip: &TripMetadata) -> Result<Vec<TelemetrySample>> {
        match self {
            SourceBackend::Csv(source) => source.telemetry(trip).await,
            #[cfg(test)]
            SourceBackend::InMemory(source) => source.telemetry(trip).await,
        }
    }
}

// ===== Store Trait and Backend Enum =====

/// 🎫 What happened when a trip name was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TripRegistration {
    /// ✅ Fresh row.
    Created(TripId),
    /// ♻️ Old row (and every telemetry row hanging off it) deleted, fresh row inserted.
    Replaced(TripId),
    /// ⏭️ Name already present; nothing touched. The id is the existing row's.
    Skipped(TripId),
}

/// 🗄️ A relational target for the loader.
///
/// `&self` everywhere: a store is a shared handle over a connection pool, and
/// many workers hold it at once.
///
/// # Contract
/// - `upsert_bus` / `upsert_route` are insert-or-get. Same key, same id, one row.
/// - `register_trip` commits before returning. Nothing else for that trip exists yet.
/// - `insert_telemetry_batch` is one session and one transaction: every row of
///   the batch commits or none does. Returns the number of rows written.
/// - `telemetry_row_count` lets a skipped re-run tell a complete trip from a partial one.
/// - `maintain_partitions` is idempotent and only ever called after the last trip.
#[async_trait]
pub(crate) trait Store: std::fmt::Debug + Send + Sync {
    async fn migrate(&self) -> Result<()>;
    async fn upsert_bus(&self, bus_number: &str) -> Result<BusId>;
    async fn upsert_route(&self, route_code: &str) -> Result<RouteId>;
    async fn register_trip(
        &self,
        trip: &TripRow,
        policy: ExistingTripPolicy,
    ) -> Result<TripRegistration>;
    async fn insert_telemetry_batch(&self, batch: &TelemetryBatch) -> Result<u64>;
    /// 🔢 Telemetry rows currently stored for one trip.
    async fn telemetry_row_count(&self, trip_id: TripId) -> Result<u64>;
    async fn maintain_partitions(&self) -> Result<()>;
    /// 🔒 The session budget every concurrent writer shares.
    fn max_connections(&self) -> u32;
}

#[derive(Debug, Clone)]
pub(crate) enum StoreBackend {
    Postgres(PostgresStore),
    InMemory(InMemoryStore),
}

impl StoreBackend {
    /// 🏗️ Connects (or pretends to) according to the `store` section of the config.
    pub(crate) async fn from_config(config: &StoreConfig) -> Result<Self> {
        Ok(match config {
            StoreConfig::Postgres(pg) => StoreBackend::Postgres(PostgresStore::connect(pg).await?),
            StoreConfig::InMemory(mem) => StoreBackend::InMemory(InMemoryStore::new(mem)),
        })
    }
}

#[async_trait]
impl Store for StoreBackend {
    async fn migrate(&self) -> Result<()> {
        match self {
            StoreBackend::Postgres(store) => store.migrate().await,
            StoreBackend::InMemory(store) => store.migrate().await,
        }
    }

    async fn upsert_bus(&self, bus_number: &str) -> Result<BusId> {
        match self {
            StoreBackend::Postgres(store) => store.upsert_bus(bus_number).await,
            StoreBackend::InMemory(store) => store.upsert_bus(bus_number).await,
        }
    }

    async fn upsert_route(&self, route_code: &str) -> Result<RouteId> {
        match self {
            StoreBackend::Postgres(store) => store.upsert_route(route_code).await,
            StoreBackend::InMemory(store) => store.upsert_route(route_code).await,
        }
    }

    async fn register_trip(
        &self,
        trip: &TripRow,
        policy: ExistingTripPolicy,
    ) -> Result<TripRegistration> {
        match self {
            StoreBackend::Postgres(store) => store.register_trip(trip, policy).await,
            StoreBackend::InMemory(store) => store.register_trip(trip, policy).await,
        }
    }

    async fn insert_telemetry_batch(&self, batch: &TelemetryBatch) -> Result<u64> {
        match self {
            StoreBackend::Postgres(store) => store.insert_telemetry_batch(batch).await,
            StoreBackend::InMemory(store) => store.insert_telemetry_batch(batch).await,
        }
    }

    async fn telemetry_row_count(&self, trip_id: TripId) -> Result<u64> {
        match self {
            StoreBackend::Postgres(store) => store.telemetry_row_count(trip_id).await,
            StoreBackend::InMemory(store) => store.telemetry_row_count(trip_id).await,
        }
    }

    async fn maintain_partitions(&self) -> Result<()> {
        match self {
            StoreBackend::Postgres(store) => store.maintain_partitions().await,
            StoreBackend::InMemory(store) => store.maintain_partitions().await,
        }
    }

    fn max_connections(&self) -> u32 {
        match self {
            StoreBackend::Postgres(store) => store.max_connections(),
            StoreBackend::InMemory(store) => store.max_connections(),
        }
    }
}
