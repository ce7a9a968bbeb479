//! 📅 Partition maintenance: the last thing a run does, once every trip has been attempted.

use std::time::Instant;

use tracing::{error, info};

use crate::backends::{Store, StoreBackend};
use crate::error::IngestError;

/// 📅 Ask the store to sort telemetry into monthly partitions.
///
/// A failure here fails the run, but whatever already committed stays committed.
pub(crate) async fn make_partitions(store: &StoreBackend) -> Result<(), IngestError> {
    info!("📅 arranging telemetry partitions");
    let started = Instant::now();
    match store.maintain_partitions().await {
        Ok(()) => {
            info!(elapsed_ms = started.elapsed().as_millis() as u64, "📅 partitions arranged");
            Ok(())
        }
        Err(source) => {
            error!(error = %format!("{source:#}"), "💀 partition maintenance failed");
            Err(IngestError::Maintenance { source })
        }
    }
}
