// ai
//! 🔄 Mapping: where parsed records become rows the store can swallow.
//!
//! Three jobs, no opinions:
//! - epoch seconds → UTC `timestamp`
//! - `TripMetadata` + resolved ids → [`TripRow`]
//! - `TelemetrySample` + trip/route ids → [`TelemetryRow`], and a batch of those
//!   → the CSV payload that rides `COPY ... FROM STDIN`.
//!
//! 🧠 Knowledge graph: `TelemetryRow` field order IS the COPY column order.
//! [`TELEMETRY_COLUMNS`] spells it out for the SQL side and a test keeps the
//! two honest. Touch one, touch the other.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;

use crate::common::{BusId, RouteId, TelemetryBatch, TelemetrySample, TripId, TripMetadata};

/// 📋 Column list for `COPY telemetry (...)`, in [`TelemetryRow`] field order.
pub(crate) const TELEMETRY_COLUMNS: &[&str] = &[
    "trip_id",
    "time",
    "electric_power_demand",
    "gnss_altitude",
    "gnss_course",
    "gnss_latitude",
    "gnss_longitude",
    "itcs_number_of_passengers",
    "itcs_stop_name",
    "odometry_articulation_angle",
    "odometry_steering_angle",
    "odometry_vehicle_speed",
    "odometry_wheel_speed_fl",
    "odometry_wheel_speed_fr",
    "odometry_wheel_speed_ml",
    "odometry_wheel_speed_mr",
    "odometry_wheel_speed_rl",
    "odometry_wheel_speed_rr",
    "status_door_is_open",
    "status_grid_is_available",
    "status_halt_brake_is_active",
    "status_park_brake_is_active",
    "temperature_ambient",
    "traction_brake_pressure",
    "traction_traction_force",
    "bus_route_id",
];

/// ⏰ Epoch seconds → naive UTC timestamp. Out-of-range epochs are input errors, not year 1970.
pub(crate) fn epoch_to_timestamp(secs: i64) -> Result<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0)
        .map(|utc| utc.naive_utc())
        .with_context(|| format!("💀 epoch second {secs} is outside the representable timestamp range"))
}

/// 🕰️ The closed [start, end] interval of a trip, validated.
pub(crate) fn trip_interval(trip: &TripMetadata) -> Result<(NaiveDateTime, NaiveDateTime)> {
    let start = epoch_to_timestamp(trip.start_time_unix).context("💀 bad trip start time")?;
    let end = epoch_to_timestamp(trip.end_time_unix).context("💀 bad trip end time")?;
    if end < start {
        bail!(
            "💀 trip '{}' ends ({end}) before it starts ({start}). time travel is out of scope.",
            trip.name
        );
    }
    Ok((start, end))
}

/// 🔍 Walks every sample once so a bad timestamp surfaces before any database work.
pub(crate) fn validate_samples(samples: &[TelemetrySample]) -> Result<()> {
    for (index, sample) in samples.iter().enumerate() {
        epoch_to_timestamp(sample.time_unix)
            .with_context(|| format!("💀 telemetry row {} has an unusable timestamp", index + 1))?;
    }
    Ok(())
}

/// 🎫 Everything the `trips` insert needs, already in storage types.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TripRow {
    pub name: String,
    pub bus_id: BusId,
    pub route_id: RouteId,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub driven_distance_km: f32,
    pub energy_consumption_kwh: i32,
    pub passengers_mean: f32,
    pub passengers_min: i32,
    pub passengers_max: i32,
    pub grid_available_mean: f32,
    pub temperature_mean: f32,
    pub temperature_min: f32,
    pub temperature_max: f32,
}

impl TripRow {
    pub(crate) fn new(
        trip: &TripMetadata,
        bus_id: BusId,
        route_id: RouteId,
        (start_time, end_time): (NaiveDateTime, NaiveDateTime),
    ) -> Self {
        Self {
            name: trip.name.clone(),
            bus_id,
            route_id,
            start_time,
            end_time,
            driven_distance_km: trip.driven_distance_km as f32,
            energy_consumption_kwh: trip.energy_consumption_kwh.round() as i32,
            passengers_mean: trip.passengers_mean as f32,
            passengers_min: trip.passengers_min.round() as i32,
            passengers_max: trip.passengers_max.round() as i32,
            grid_available_mean: trip.grid_available_mean as f32,
            temperature_mean: trip.temperature_mean as f32,
            temperature_min: trip.temperature_min as f32,
            temperature_max: trip.temperature_max as f32,
        }
    }
}

/// 📡 One telemetry row in storage shape. `None` stays `None` all the way to NULL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct TelemetryRow {
    pub trip_id: i32,
    pub time: NaiveDateTime,
    pub electric_power_demand: f32,
    pub gnss_altitude: Option<f32>,
    pub gnss_course: Option<f32>,
    pub gnss_latitude: Option<f32>,
    pub gnss_longitude: Option<f32>,
    pub itcs_number_of_passengers: Option<i32>,
    pub itcs_stop_name: Option<String>,
    pub odometry_articulation_angle: f32,
    pub odometry_steering_angle: f32,
    pub odometry_vehicle_speed: f32,
    pub odometry_wheel_speed_fl: f32,
    pub odometry_wheel_speed_fr: f32,
    pub odometry_wheel_speed_ml: f32,
    pub odometry_wheel_speed_mr: f32,
    pub odometry_wheel_speed_rl: f32,
    pub odometry_wheel_speed_rr: f32,
    pub status_door_is_open: bool,
    pub status_grid_is_available: bool,
    pub status_halt_brake_is_active: bool,
    pub status_park_brake_is_active: bool,
    pub temperature_ambient: f32,
    pub traction_brake_pressure: f32,
    pub traction_traction_force: f32,
    pub bus_route_id: i32,
}

impl TelemetryRow {
    pub(crate) fn from_sample(
        sample: &TelemetrySample,
        trip_id: TripId,
        route_id: RouteId,
    ) -> Result<Self> {
        Ok(Self {
            trip_id: trip_id.0,
            time: epoch_to_timestamp(sample.time_unix)?,
            electric_power_demand: sample.electric_power_demand as f32,
            gnss_altitude: sample.gnss_altitude.map(|v| v as f32),
            gnss_course: sample.gnss_course.map(|v| v as f32),
            gnss_latitude: sample.gnss_latitude.map(|v| v as f32),
            gnss_longitude: sample.gnss_longitude.map(|v| v as f32),
            itcs_number_of_passengers: sample.itcs_number_of_passengers,
            itcs_stop_name: sample.itcs_stop_name.clone(),
            odometry_articulation_angle: sample.odometry_articulation_angle as f32,
            odometry_steering_angle: sample.odometry_steering_angle as f32,
            odometry_vehicle_speed: sample.odometry_vehicle_speed as f32,
            odometry_wheel_speed_fl: sample.odometry_wheel_speed_fl as f32,
            odometry_wheel_speed_fr: sample.odometry_wheel_speed_fr as f32,
            odometry_wheel_speed_ml: sample.odometry_wheel_speed_ml as f32,
            odometry_wheel_speed_mr: sample.odometry_wheel_speed_mr as f32,
            odometry_wheel_speed_rl: sample.odometry_wheel_speed_rl as f32,
            odometry_wheel_speed_rr: sample.odometry_wheel_speed_rr as f32,
            status_door_is_open: sample.status_door_is_open,
            status_grid_is_available: sample.status_grid_is_available,
            status_halt_brake_is_active: sample.status_halt_brake_is_active,
            status_park_brake_is_active: sample.status_park_brake_is_active,
            temperature_ambient: sample.temperature_ambient as f32,
            traction_brake_pressure: sample.traction_brake_pressure as f32,
            traction_traction_force: sample.traction_traction_force as f32,
            bus_route_id: route_id.0,
        })
    }
}

/// 🏗️ Every sample of a batch mapped to a row. All or nothing: one bad row fails the batch.
pub(crate) fn batch_rows(batch: &TelemetryBatch, route_id: RouteId) -> Result<Vec<TelemetryRow>> {
    batch
        .samples
        .iter()
        .enumerate()
        .map(|(offset, sample)| {
            TelemetryRow::from_sample(sample, batch.trip_id, route_id).with_context(|| {
                format!("💀 row {} of batch {} could not be mapped", offset + 1, batch.label())
            })
        })
        .collect()
}

/// 📦 Renders rows as a headerless CSV payload for `COPY ... WITH (FORMAT csv)`.
///
/// Postgres reads an unquoted empty field as NULL in CSV mode, which is exactly
/// what the csv writer emits for `None`. Text that needs quoting gets quoted.
pub(crate) fn encode_copy_payload(rows: &[TelemetryRow]) -> Result<Vec<u8>> {
    // -- 🧮 ~200 bytes a row is the observed average. a guess, but an informed one.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::with_capacity(rows.len() * 200));
    for row in rows {
        writer
            .serialize(row)
            .context("💀 failed to render a telemetry row into the COPY payload")?;
    }
    writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("💀 failed to flush the COPY payload: {}", err.error()))
}
