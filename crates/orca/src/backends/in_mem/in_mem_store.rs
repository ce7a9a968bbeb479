use std::collections::{BTreeSet, HashMap};
#[cfg(test)]
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
#[cfg(test)]
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use async_trait::async_trait;
use chrono::Datelike;
use serde::Deserialize;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info};

use crate::app_config::ExistingTripPolicy;
use crate::backends::{PoolConfig, Store, TripRegistration};
use crate::common::{BusId, RouteId, TelemetryBatch, TripId};
use crate::mapping::{TelemetryRow, TripRow, batch_rows};

/// 🧪 Config for the in-memory store. Only the connection budget matters here.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct InMemoryStoreConfig {
    #[serde(default)]
    pub pool: PoolConfig,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredTrip {
    pub id: TripId,
    pub row: TripRow,
}

/// 🗃️ Every "table", behind one lock.
#[derive(Debug, Default)]
struct Tables {
    buses: HashMap<String, BusId>,
    routes: HashMap<String, RouteId>,
    trips: Vec<StoredTrip>,
    telemetry: Vec<TelemetryRow>,
    /// 📅 `telemetry_YYYY_MM` names created by maintenance.
    partitions: BTreeSet<String>,
    maintenance_calls: usize,
    // -- 🔢 ids start at 1, like a freshly created identity column
    last_bus_id: i32,
    last_route_id: i32,
    last_trip_id: i32,
    #[cfg(test)]
    doomed_batches: HashSet<(String, usize)>,
    #[cfg(test)]
    doomed_maintenance: bool,
}

/// 🗄️ A store that lives and dies with the process.
///
/// `Clone` hands out another handle to the same tables, so a test can keep one
/// and give the other to the supervisor.
#[derive(Debug, Clone)]
pub(crate) struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    /// 🔒 Stand-in for the connection pool. One permit per session.
    sessions: Arc<Semaphore>,
    max_connections: u32,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    #[cfg(test)]
    batch_latency: Option<Duration>,
}

impl InMemoryStore {
    pub(crate) fn new(config: &InMemoryStoreConfig) -> Self {
        let max_connections = config.pool.max_connections.max(1);
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            sessions: Arc::new(Semaphore::new(max_connections as usize)),
            max_connections,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            #[cfg(test)]
            batch_latency: None,
        }
    }

    /// 📥 The body of one "transaction": check the trip, map every row, then append all of them.
    async fn copy_batch(&self, batch: &TelemetryBatch) -> Result<u64> {
        #[cfg(test)]
        if let Some(latency) = self.batch_latency {
            tokio::time::sleep(latency).await;
        }

        let mut tables = self.tables.lock().await;

        #[cfg(test)]
        if tables
            .doomed_batches
            .contains(&(batch.trip_name.to_string(), batch.batch_number))
        {
            bail!("💀 injected failure: the disk is full of bees");
        }

        let route_id = tables
            .trips
            .iter()
            .find(|stored| stored.id == batch.trip_id)
            .map(|stored| stored.row.route_id)
            .with_context(|| {
                format!(
                    "💀 insert on telemetry violates foreign key: trip id {} does not exist",
                    batch.trip_id.0
                )
            })?;

        let rows = batch_rows(batch, route_id)?;
        let written = rows.len() as u64;
        tables.telemetry.extend(rows);
        Ok(written)
    }
}

// -- 🧪 test-only knobs and peepholes
#[cfg(test)]
impl InMemoryStore {
    pub(crate) fn with_max_connections(max_connections: u32) -> Self {
        Self::new(&InMemoryStoreConfig {
            pool: PoolConfig {
                max_connections,
                min_connections: Some(0),
                ..PoolConfig::default()
            },
        })
    }

    /// ⏳ Every batch sleeps this long while holding its session, so overlap is observable.
    pub(crate) fn with_batch_latency(mut self, latency: Duration) -> Self {
        self.batch_latency = Some(latency);
        self
    }

    pub(crate) async fn fail_batch(&self, trip_name: &str, batch_number: usize) {
        self.tables
            .lock()
            .await
            .doomed_batches
            .insert((trip_name.to_string(), batch_number));
    }

    pub(crate) async fn fail_maintenance(&self) {
        self.tables.lock().await.doomed_maintenance = true;
    }

    pub(crate) async fn bus_count(&self) -> usize {
        self.tables.lock().await.buses.len()
    }

    pub(crate) async fn route_count(&self) -> usize {
        self.tables.lock().await.routes.len()
    }

    pub(crate) async fn trips(&self) -> Vec<StoredTrip> {
        self.tables.lock().await.trips.clone()
    }

    pub(crate) async fn telemetry_rows(&self) -> Vec<TelemetryRow> {
        self.tables.lock().await.telemetry.clone()
    }

    pub(crate) async fn partitions(&self) -> Vec<String> {
        self.tables.lock().await.partitions.iter().cloned().collect()
    }

    pub(crate) async fn maintenance_calls(&self) -> usize {
        self.tables.lock().await.maintenance_calls
    }

    pub(crate) fn peak_sessions(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn migrate(&self) -> Result<()> {
        debug!("🧪 in-memory store has no schema to migrate; the tables are vibes");
        Ok(())
    }

    async fn upsert_bus(&self, bus_number: &str) -> Result<BusId> {
        let mut tables = self.tables.lock().await;
        if let Some(id) = tables.buses.get(bus_number) {
            return Ok(*id);
        }
        tables.last_bus_id += 1;
        let id = BusId(tables.last_bus_id);
        tables.buses.insert(bus_number.to_string(), id);
        Ok(id)
    }

    async fn upsert_route(&self, route_code: &str) -> Result<RouteId> {
        let mut tables = self.tables.lock().await;
        if let Some(id) = tables.routes.get(route_code) {
            return Ok(*id);
        }
        tables.last_route_id += 1;
        let id = RouteId(tables.last_route_id);
        tables.routes.insert(route_code.to_string(), id);
        Ok(id)
    }

    async fn register_trip(
        &self,
        trip: &TripRow,
        policy: ExistingTripPolicy,
    ) -> Result<TripRegistration> {
        let mut tables = self.tables.lock().await;
        ensure!(
            tables.buses.values().any(|id| *id == trip.bus_id),
            "💀 insert on trips violates foreign key: bus id {} does not exist",
            trip.bus_id.0
        );
        ensure!(
            tables.routes.values().any(|id| *id == trip.route_id),
            "💀 insert on trips violates foreign key: route id {} does not exist",
            trip.route_id.0
        );

        let existing = tables
            .trips
            .iter()
            .position(|stored| stored.row.name == trip.name);
        let replaced = match (existing, policy) {
            (Some(index), ExistingTripPolicy::Skip) => {
                return Ok(TripRegistration::Skipped(tables.trips[index].id));
            }
            (Some(_), ExistingTripPolicy::Fail) => {
                bail!(
                    "💀 duplicate key value violates unique constraint: trip '{}' already exists",
                    trip.name
                );
            }
            (Some(index), ExistingTripPolicy::Replace) => {
                // -- 🗑️ ON DELETE CASCADE, the artisanal hand-rolled edition
                let old = tables.trips.remove(index);
                tables.telemetry.retain(|row| row.trip_id != old.id.0);
                true
            }
            (None, _) => false,
        };

        tables.last_trip_id += 1;
        let id = TripId(tables.last_trip_id);
        tables.trips.push(StoredTrip {
            id,
            row: trip.clone(),
        });
        Ok(if replaced {
            TripRegistration::Replaced(id)
        } else {
            TripRegistration::Created(id)
        })
    }

    async fn insert_telemetry_batch(&self, batch: &TelemetryBatch) -> Result<u64> {
        let _session = self
            .sessions
            .acquire()
            .await
            .context("💀 the in-memory connection pool was closed")?;
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        let result = self.copy_batch(batch).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn telemetry_row_count(&self, trip_id: TripId) -> Result<u64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .telemetry
            .iter()
            .filter(|row| row.trip_id == trip_id.0)
            .count() as u64)
    }

    async fn maintain_partitions(&self) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.maintenance_calls += 1;

        #[cfg(test)]
        if tables.doomed_maintenance {
            bail!("💀 injected failure: procedure make_partitions() does not exist");
        }

        let months: BTreeSet<String> = tables
            .telemetry
            .iter()
            .map(|row| format!("telemetry_{:04}_{:02}", row.time.year(), row.time.month()))
            .collect();
        let created = months.difference(&tables.partitions).count();
        tables.partitions.extend(months);
        info!(created, total = tables.partitions.len(), "📅 in-memory partitions arranged");
        Ok(())
    }

    fn max_connections(&self) -> u32 {
        self.max_connections
    }
}
