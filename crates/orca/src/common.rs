// ai
//! 📦 Common data structures: the building blocks of orca.
//!
//! 🎬 COLD OPEN. INT. BUS DEPOT, 4:12 AM
//!
//! A trolleybus rolls in after a long shift. Its logger has been writing one
//! row per second since sunrise: speed, wheel speeds, door state, whether the
//! overhead grid was there for it. Nobody thanked it. Somebody has to load it.
//!
//! These are the structs that ferry a trip from CSV into Postgres. Records come
//! out of a [`Source`](crate::backends::Source) already parsed, get tagged with
//! surrogate ids, sliced into [`TelemetryBatch`]es, and handed to workers.
//!
//! 🦆 The duck rides for free.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, de};

/// 🚌 Surrogate id of a bus row. Assigned on first upsert, immutable after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusId(pub i32);

/// 🗺️ Surrogate id of a route row. Same upsert story as [`BusId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(pub i32);

/// 🎫 Surrogate id of a trip row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripId(pub i32);

/// 📋 One row of `metaData.csv`: the trip summary.
///
/// Aggregates arrive as floats even when the store keeps integers (energy,
/// passenger min/max). The mapping layer rounds them on the way in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TripMetadata {
    pub name: String,
    #[serde(rename = "busNumber")]
    pub bus_number: String,
    #[serde(rename = "startTime_unix")]
    pub start_time_unix: i64,
    #[serde(rename = "endTime_unix")]
    pub end_time_unix: i64,
    #[serde(rename = "drivenDistance")]
    pub driven_distance_km: f64,
    #[serde(rename = "busRoute")]
    pub route_code: String,
    #[serde(rename = "energyConsumption")]
    pub energy_consumption_kwh: f64,
    #[serde(rename = "itcs_numberOfPassengers_mean")]
    pub passengers_mean: f64,
    #[serde(rename = "itcs_numberOfPassengers_min")]
    pub passengers_min: f64,
    #[serde(rename = "itcs_numberOfPassengers_max")]
    pub passengers_max: f64,
    #[serde(rename = "status_gridIsAvailable_mean")]
    pub grid_available_mean: f64,
    #[serde(rename = "temperature_ambient_mean")]
    pub temperature_mean: f64,
    #[serde(rename = "temperature_ambient_min")]
    pub temperature_min: f64,
    #[serde(rename = "temperature_ambient_max")]
    pub temperature_max: f64,
}

/// 📡 One telemetry sample: one row of `<trip>.csv`, one second in the life of a bus.
///
/// `Option` fields are the ones the logger is allowed to leave blank. A blank
/// cell is `None` and lands in Postgres as NULL. Not zero. Not "". NULL.
/// A bus standing still at 0 km/h is a measurement; a missing GNSS fix is not.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TelemetrySample {
    pub time_unix: i64,
    #[serde(rename = "electric_powerDemand")]
    pub electric_power_demand: f64,
    pub gnss_altitude: Option<f64>,
    pub gnss_course: Option<f64>,
    pub gnss_latitude: Option<f64>,
    pub gnss_longitude: Option<f64>,
    /// 🗺️ Route the ITCS thought it was on. Informational only: storage uses the trip's route.
    #[serde(rename = "itcs_busRoute", default)]
    pub itcs_bus_route: Option<String>,
    #[serde(rename = "itcs_numberOfPassengers")]
    pub itcs_number_of_passengers: Option<i32>,
    #[serde(rename = "itcs_stopName")]
    pub itcs_stop_name: Option<String>,
    #[serde(rename = "odometry_articulationAngle")]
    pub odometry_articulation_angle: f64,
    #[serde(rename = "odometry_steeringAngle")]
    pub odometry_steering_angle: f64,
    #[serde(rename = "odometry_vehicleSpeed")]
    pub odometry_vehicle_speed: f64,
    #[serde(rename = "odometry_wheelSpeed_fl")]
    pub odometry_wheel_speed_fl: f64,
    #[serde(rename = "odometry_wheelSpeed_fr")]
    pub odometry_wheel_speed_fr: f64,
    #[serde(rename = "odometry_wheelSpeed_ml")]
    pub odometry_wheel_speed_ml: f64,
    #[serde(rename = "odometry_wheelSpeed_mr")]
    pub odometry_wheel_speed_mr: f64,
    #[serde(rename = "odometry_wheelSpeed_rl")]
    pub odometry_wheel_speed_rl: f64,
    #[serde(rename = "odometry_wheelSpeed_rr")]
    pub odometry_wheel_speed_rr: f64,
    #[serde(rename = "status_doorIsOpen", deserialize_with = "deserialize_flag")]
    pub status_door_is_open: bool,
    #[serde(rename = "status_gridIsAvailable", deserialize_with = "deserialize_flag")]
    pub status_grid_is_available: bool,
    #[serde(rename = "status_haltBrakeIsActive", deserialize_with = "deserialize_flag")]
    pub status_halt_brake_is_active: bool,
    #[serde(rename = "status_parkBrakeIsActive", deserialize_with = "deserialize_flag")]
    pub status_park_brake_is_active: bool,
    pub temperature_ambient: f64,
    #[serde(rename = "traction_brakePressure")]
    pub traction_brake_pressure: f64,
    #[serde(rename = "traction_tractionForce")]
    pub traction_traction_force: f64,
}

/// 🚦 Parses the many dialects of "yes" a data logger might speak.
///
/// `1`/`0`, `t`/`f`, `true`/`false`, any case. Anything else is a malformed row,
/// not a silent `false`.
pub(crate) fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_flag(&raw).ok_or_else(|| {
        de::Error::invalid_value(de::Unexpected::Str(&raw), &"a boolean flag (1/0, t/f, true/false)")
    })
}

pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        // -- "1.0" shows up when someone round-trips the CSV through a spreadsheet. we forgive them.
        "1.0" => Some(true),
        "0.0" => Some(false),
        _ => None,
    }
}

/// 🎫 A trip that made it into the store: its id plus the keys it hangs off.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredTrip {
    pub id: TripId,
    pub name: Arc<str>,
    pub bus_id: BusId,
    pub route_id: RouteId,
}

/// 📦 A contiguous slice of one trip's samples: the unit of work and the unit of atomicity.
///
/// Created by the batcher, consumed exactly once by one worker, then dropped
/// after its outcome is reported. Carries everything a worker needs to act and
/// everything a human needs to diagnose a failure without re-running the trip.
#[derive(Debug, Clone)]
pub struct TelemetryBatch {
    pub trip_id: TripId,
    pub trip_name: Arc<str>,
    /// 1-based.
    pub batch_number: usize,
    pub total_batches: usize,
    pub samples: Vec<TelemetrySample>,
}

impl TelemetryBatch {
    /// 🏷️ `"2/3"`: the label that goes in logs and error messages.
    pub fn label(&self) -> String {
        format!("{}/{}", self.batch_number, self.total_batches)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
