//! 🧪 Fixtures for tests. Fake buses, fake trips, real assertions.

use crate::common::{TelemetrySample, TripMetadata};

/// 🎫 A perfectly ordinary trip. 08:00 to 09:00 UTC on 2021-01-01.
pub(crate) fn trip(name: &str, bus_number: &str, route_code: &str) -> TripMetadata {
    TripMetadata {
        name: name.to_string(),
        bus_number: bus_number.to_string(),
        start_time_unix: 1_609_488_000,
        end_time_unix: 1_609_491_600,
        driven_distance_km: 21.4,
        route_code: route_code.to_string(),
        energy_consumption_kwh: 38.0,
        passengers_mean: 12.5,
        passengers_min: 0.0,
        passengers_max: 41.0,
        grid_available_mean: 0.93,
        temperature_mean: 4.2,
        temperature_min: 2.0,
        temperature_max: 6.5,
    }
}

/// 📡 A sample with every optional field present.
pub(crate) fn sample(time_unix: i64) -> TelemetrySample {
    TelemetrySample {
        time_unix,
        electric_power_demand: 51_234.5,
        gnss_altitude: Some(408.2),
        gnss_course: Some(271.0),
        gnss_latitude: Some(47.3769),
        gnss_longitude: Some(8.5417),
        itcs_bus_route: Some("33".to_string()),
        itcs_number_of_passengers: Some(17),
        itcs_stop_name: Some("Bucheggplatz".to_string()),
        odometry_articulation_angle: 0.02,
        odometry_steering_angle: -0.11,
        odometry_vehicle_speed: 8.3,
        odometry_wheel_speed_fl: 8.2,
        odometry_wheel_speed_fr: 8.4,
        odometry_wheel_speed_ml: 8.3,
        odometry_wheel_speed_mr: 8.3,
        odometry_wheel_speed_rl: 8.1,
        odometry_wheel_speed_rr: 8.5,
        status_door_is_open: false,
        status_grid_is_available: true,
        status_halt_brake_is_active: false,
        status_park_brake_is_active: false,
        temperature_ambient: 4.0,
        traction_brake_pressure: 0.0,
        traction_traction_force: 1_250.0,
    }
}

/// 📈 `count` samples, one per second from 08:00 UTC, speed encoding the position.
pub(crate) fn samples(count: usize) -> Vec<TelemetrySample> {
    (0..count)
        .map(|offset| {
            let mut s = sample(1_609_488_000 + offset as i64);
            s.odometry_vehicle_speed = offset as f64;
            s
        })
        .collect()
}
