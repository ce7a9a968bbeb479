//! 🧪 How fast can we slice a trip? Faster than Postgres can swallow it, hopefully.

use std::hint::black_box;
use std::num::NonZeroUsize;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use orca::batcher::create_batches;
use orca::common::{BusId, RegisteredTrip, RouteId, TelemetrySample, TripId};

fn sample(time_unix: i64) -> TelemetrySample {
    TelemetrySample {
        time_unix,
        electric_power_demand: 51_234.5,
        gnss_altitude: Some(408.2),
        gnss_course: None,
        gnss_latitude: Some(47.3769),
        gnss_longitude: Some(8.5417),
        itcs_bus_route: None,
        itcs_number_of_passengers: Some(17),
        itcs_stop_name: None,
        odometry_articulation_angle: 0.0,
        odometry_steering_angle: 0.0,
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

fn bench_create_batches(c: &mut Criterion) {
    let trip = RegisteredTrip {
        id: TripId(1),
        name: Arc::from("B183_2021-01-01_08-00-00_2021-01-01_09-00-00"),
        bus_id: BusId(1),
        route_id: RouteId(1),
    };
    // -- 🚌 a full day of one-second samples, roughly what one ZTBus trip file weighs
    let day: Vec<TelemetrySample> = (0..86_400).map(sample).collect();

    let mut group = c.benchmark_group("create_batches");
    group.throughput(Throughput::Elements(day.len() as u64));
    for batch_size in [1_000usize, 5_000, 20_000] {
        let size = NonZeroUsize::new(batch_size).expect("non-zero");
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &size, |b, size| {
            b.iter(|| create_batches(black_box(&trip), day.clone(), *size))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_create_batches);
criterion_main!(benches);
