// ai
//! 🚌 orca: loads recorded bus trips (metadata plus second-by-second telemetry)
//! into Postgres, one batch per transaction, many batches at a time.
//!
//! The library exposes one entry point, [`run`], plus the config types needed
//! to call it. Everything else is supervisors and workers, and they are not
//! for public consumption.

pub mod app_config;
mod backends;
pub mod batcher;
pub mod common;
pub mod error;
mod mapping;
mod progress;
mod supervisors;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use tracing::info;

use crate::app_config::AppConfig;
use crate::backends::{CsvDirSource, SourceBackend, Store, StoreBackend};
use crate::supervisors::Supervisor;

pub use crate::error::{BatchFailure, IngestError};
pub use crate::supervisors::RunSummary;

/// 🚀 Validate the config, connect, optionally migrate, then load every trip in `data_dir`.
///
/// On failure the error chain starts with an [`IngestError`] when the failure
/// belongs to the pipeline (`err.downcast_ref::<IngestError>()`), or with a
/// plain setup error (bad config, unreachable database, missing directory).
pub async fn run(app_config: AppConfig) -> Result<RunSummary> {
    app_config
        .validate()
        .context("💀 the configuration is not usable")?;

    // -- 📂 a mistyped data_dir should fail before the database hears from us
    let mut source = SourceBackend::Csv(CsvDirSource::open(&app_config.data_dir).await?);
    info!(data_dir = %app_config.data_dir.display(), "📂 reading trips");

    let store = StoreBackend::from_config(&app_config.store).await?;
    if app_config.migrate {
        store.migrate().await?;
    }

    Supervisor::new(store, app_config.runtime)
        .run(&mut source)
        .await
}
