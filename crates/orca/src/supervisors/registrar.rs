//! 🎫 Reference resolution and trip registration: the paperwork before the payload.
//!
//! Buses and routes are looked up (or created) once per run and remembered.
//! The trip row is committed in its own transaction before a single telemetry
//! batch leaves the building.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::app_config::ExistingTripPolicy;
use crate::backends::{Store, StoreBackend, TripRegistration};
use crate::common::{BusId, RegisteredTrip, RouteId, TripMetadata};
use crate::error::IngestError;
use crate::mapping::TripRow;

/// 🗺️ Natural key → surrogate id, memoized for the run.
#[derive(Debug, Default)]
pub(crate) struct ReferenceResolver {
    buses: HashMap<String, BusId>,
    routes: HashMap<String, RouteId>,
}

impl ReferenceResolver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn bus(&mut self, store: &StoreBackend, bus_number: &str) -> Result<BusId> {
        if let Some(id) = self.buses.get(bus_number) {
            return Ok(*id);
        }
        let id = store.upsert_bus(bus_number).await?;
        debug!(bus_number, bus_id = id.0, "🚌 bus resolved");
        self.buses.insert(bus_number.to_string(), id);
        Ok(id)
    }

    pub(crate) async fn route(
        &mut self,
        store: &StoreBackend,
        route_code: &str,
    ) -> Result<RouteId> {
        if let Some(id) = self.routes.get(route_code) {
            return Ok(*id);
        }
        let id = store.upsert_route(route_code).await?;
        debug!(route_code, route_id = id.0, "🗺️ route resolved");
        self.routes.insert(route_code.to_string(), id);
        Ok(id)
    }
}

/// 📋 How registration went, from the pipeline's point of view.
#[derive(Debug)]
pub(crate) enum Registration {
    /// ✅ Committed; telemetry may follow.
    Ready(RegisteredTrip),
    /// ⏭️ Already fully loaded and `existing_trip = "skip"`.
    Skipped,
}

/// 🎫 Resolve the trip's bus and route, then commit its row.
///
/// `sample_count` is how many telemetry rows the input holds for this trip. A
/// skipped trip must already have exactly that many stored, or the earlier load
/// was partial and skipping it would pass off missing rows as success.
pub(crate) async fn register_trip(
    store: &StoreBackend,
    resolver: &mut ReferenceResolver,
    trip: &TripMetadata,
    interval: (NaiveDateTime, NaiveDateTime),
    policy: ExistingTripPolicy,
    sample_count: usize,
) -> Result<Registration, IngestError> {
    let resolution_error = |source: anyhow::Error| IngestError::ReferenceResolution {
        trip: trip.name.clone(),
        source,
    };
    let bus_id = resolver
        .bus(store, &trip.bus_number)
        .await
        .map_err(resolution_error)?;
    let route_id = resolver
        .route(store, &trip.route_code)
        .await
        .map_err(resolution_error)?;

    let row = TripRow::new(trip, bus_id, route_id, interval);
    let registration_error = |source: anyhow::Error| IngestError::TripRegistration {
        trip: trip.name.clone(),
        source,
    };
    let registration = store
        .register_trip(&row, policy)
        .await
        .map_err(registration_error)?;

    let id = match registration {
        TripRegistration::Created(id) => {
            info!(trip_id = id.0, "🎫 trip registered");
            id
        }
        TripRegistration::Replaced(id) => {
            warn!(trip_id = id.0, "♻️ trip re-registered; its old telemetry is gone");
            id
        }
        TripRegistration::Skipped(id) => {
            let stored = store
                .telemetry_row_count(id)
                .await
                .map_err(registration_error)?;
            if stored != sample_count as u64 {
                return Err(registration_error(anyhow!(
                    "💀 trip '{}' (id {}) does not match its input: {stored} telemetry rows stored, \
                     {sample_count} in the input. A partial load needs existing_trip = \"replace\".",
                    trip.name,
                    id.0
                )));
            }
            info!(trip_id = id.0, rows = stored, "⏭️ trip already loaded; skipping");
            return Ok(Registration::Skipped);
        }
    };

    Ok(Registration::Ready(RegisteredTrip {
        id,
        name: Arc::from(trip.name.as_str()),
        bus_id,
        route_id,
    }))
}
