#![cfg(test)]

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::backends::Source;
use crate::common::{TelemetrySample, TripMetadata};

/// 📦 A data directory with no directory. Trips go in via the builder, come out via [`Source`].
///
/// A trip added with [`InMemorySource::with_trip_missing_telemetry`] is listed
/// but has no samples to give, which is exactly what a deleted trip file looks like.
#[derive(Debug, Default)]
pub(crate) struct InMemorySource {
    trips: Vec<TripMetadata>,
    telemetry: HashMap<String, Vec<TelemetrySample>>,
}

impl InMemorySource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_trip(mut self, trip: TripMetadata, samples: Vec<TelemetrySample>) -> Self {
        self.telemetry.insert(trip.name.clone(), samples);
        self.trips.push(trip);
        self
    }

    pub(crate) fn with_trip_missing_telemetry(mut self, trip: TripMetadata) -> Self {
        self.trips.push(trip);
        self
    }
}

#[async_trait]
impl Source for InMemorySource {
    async fn trips(&mut self) -> Result<Vec<TripMetadata>> {
        Ok(self.trips.clone())
    }

    async fn telemetry(&mut self, trip: &TripMetadata) -> Result<Vec<TelemetrySample>> {
        // -- 🍪 each trip's samples are handed out once, like the real thing reads a file once
        self.telemetry
            .remove(&trip.name)
            .with_context(|| format!("💀 no telemetry file for trip '{}'", trip.name))
    }
}
