// ai
//! 💀 The error taxonomy: every way a trip can go sideways, sorted by blast radius.
//!
//! Everything below this layer speaks `anyhow` with `.context(...)`. This enum
//! is where those causes get pinned to a trip name (and a batch number, when
//! there is one) so whoever reads the log at 3am knows exactly what to re-run.
//!
//! | variant               | blast radius                                  |
//! |-----------------------|-----------------------------------------------|
//! | `Input`               | one trip, before any database work            |
//! | `ReferenceResolution` | one trip                                      |
//! | `TripRegistration`    | one trip, no telemetry dispatched             |
//! | `Telemetry`           | the whole run (partial trip data may exist)   |
//! | `TripsFailed`         | the whole run, reported after maintenance     |
//! | `Maintenance`         | the whole run, committed data stays committed |

use thiserror::Error;

/// 📦 One batch that did not commit. Its rows are not in the store; its siblings may be.
#[derive(Debug, Error)]
#[error("batch {batch_number}/{total_batches} of trip '{trip}' failed")]
pub struct BatchFailure {
    pub trip: String,
    pub batch_number: usize,
    pub total_batches: usize,
    #[source]
    pub cause: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("💀 could not read the input for trip '{trip}'")]
    Input {
        trip: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("💀 could not resolve bus/route references for trip '{trip}'")]
    ReferenceResolution {
        trip: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("💀 could not register trip '{trip}'; no telemetry was dispatched for it")]
    TripRegistration {
        trip: String,
        #[source]
        source: anyhow::Error,
    },

    /// ⚠️ Some batches may have committed. The trip is partially loaded and
    /// needs a re-run with `existing_trip = "replace"`.
    #[error(
        "💀 telemetry load for trip '{trip}' failed: {failed} of {total_batches} batches did not commit"
    )]
    Telemetry {
        trip: String,
        failed: usize,
        total_batches: usize,
        #[source]
        first: BatchFailure,
        rest: Vec<BatchFailure>,
    },

    #[error("💀 {} trip(s) failed to load: {}", .trips.len(), .trips.join(", "))]
    TripsFailed { trips: Vec<String> },

    #[error("💀 partition maintenance failed; already committed data is untouched")]
    Maintenance {
        #[source]
        source: anyhow::Error,
    },
}

impl IngestError {
    /// 🏷️ The trip this error belongs to, if it belongs to exactly one.
    pub fn trip(&self) -> Option<&str> {
        match self {
            Self::Input { trip, .. }
            | Self::ReferenceResolution { trip, .. }
            | Self::TripRegistration { trip, .. }
            | Self::Telemetry { trip, .. } => Some(trip),
            Self::TripsFailed { .. } | Self::Maintenance { .. } => None,
        }
    }

    /// 🧨 Telemetry failures leave partial data behind, so they always stop the run.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Self::Telemetry { .. } | Self::TripsFailed { .. } | Self::Maintenance { .. }
        )
    }

    /// 📋 Every failed batch, lowest batch number first.
    pub fn batch_failures(&self) -> Vec<&BatchFailure> {
        match self {
            Self::Telemetry { first, rest, .. } => {
                std::iter::once(first).chain(rest.iter()).collect()
            }
            _ => Vec::new(),
        }
    }
}
