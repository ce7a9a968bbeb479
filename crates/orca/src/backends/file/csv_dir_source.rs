use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::backends::Source;
use crate::common::{TelemetrySample, TripMetadata};

/// 📋 The trip index every data directory must carry.
pub(crate) const METADATA_FILE: &str = "metaData.csv";

/// 📂 CsvDirSource: reads trip metadata and per-trip telemetry from a directory of CSVs.
///
/// Parsing is CPU-bound and `csv` is a blocking reader, so every file is parsed
/// on the blocking pool. The async side just waits politely.
#[derive(Debug)]
pub(crate) struct CsvDirSource {
    data_dir: PathBuf,
}

impl CsvDirSource {
    /// 🚀 Checks the directory and its `metaData.csv` exist, then gets out of the way.
    pub(crate) async fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let dir_meta = tokio::fs::metadata(&data_dir).await.with_context(|| {
            format!(
                "💀 data directory '{}' could not be inspected. Does it exist? Is it a relative path from the wrong cwd?",
                data_dir.display()
            )
        })?;
        ensure!(
            dir_meta.is_dir(),
            "💀 data directory '{}' is a file, not a directory",
            data_dir.display()
        );

        let metadata_path = data_dir.join(METADATA_FILE);
        let has_metadata = tokio::fs::try_exists(&metadata_path)
            .await
            .with_context(|| format!("💀 could not check for '{}'", metadata_path.display()))?;
        ensure!(
            has_metadata,
            "💀 '{}' not found. Every data directory needs a {METADATA_FILE} listing its trips.",
            metadata_path.display()
        );

        debug!(data_dir = %data_dir.display(), "📂 data directory looks loadable");
        Ok(Self { data_dir })
    }

    /// 🔍 `<name>.csv` if present, else `<name>.csv.gz`, else a helpful error.
    fn telemetry_path(&self, trip_name: &str) -> Result<PathBuf> {
        // -- 🔒 trip names become file names; keep them inside the data directory
        if trip_name.is_empty()
            || trip_name.contains('/')
            || trip_name.contains('\\')
            || trip_name.contains("..")
        {
            bail!("💀 trip name '{trip_name}' cannot be used as a file name");
        }

        let plain = self.data_dir.join(format!("{trip_name}.csv"));
        if plain.try_exists().unwrap_or(false) {
            return Ok(plain);
        }
        let squeezed = self.data_dir.join(format!("{trip_name}.csv.gz"));
        if squeezed.try_exists().unwrap_or(false) {
            return Ok(squeezed);
        }
        bail!(
            "💀 no telemetry file for trip '{trip_name}': looked for '{}' and '{}'",
            plain.display(),
            squeezed.display()
        )
    }
}

#[async_trait]
impl Source for CsvDirSource {
    async fn trips(&mut self) -> Result<Vec<TripMetadata>> {
        let path = self.data_dir.join(METADATA_FILE);
        let trips: Vec<TripMetadata> =
            tokio::task::spawn_blocking(move || read_csv_file::<TripMetadata>(&path))
                .await
                .context("💀 the metadata parsing task panicked")??;
        debug!(trips = trips.len(), "📋 trip metadata loaded");
        Ok(trips)
    }

    async fn telemetry(&mut self, trip: &TripMetadata) -> Result<Vec<TelemetrySample>> {
        let path = self.telemetry_path(&trip.name)?;
        let samples: Vec<TelemetrySample> =
            tokio::task::spawn_blocking(move || read_csv_file::<TelemetrySample>(&path))
                .await
                .context("💀 the telemetry parsing task panicked")??;
        trace!(samples = samples.len(), "📡 telemetry parsed");
        Ok(samples)
    }
}

/// 📖 Opens a `.csv` or `.csv.gz` and deserializes every record. Blocking.
fn read_csv_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file =
        File::open(path).with_context(|| format!("💀 could not open '{}'", path.display()))?;
    let label = path.display().to_string();
    if path.extension().is_some_and(|ext| ext == "gz") {
        read_records(GzDecoder::new(BufReader::new(file)), &label)
    } else {
        read_records(BufReader::new(file), &label)
    }
}

/// 📖 Header-addressed CSV → `Vec<T>`. Whitespace trimmed, blank optional cells are `None`.
///
/// The csv error already names record, line and byte; we add the file.
fn read_records<T: DeserializeOwned, R: Read>(reader: R, label: &str) -> Result<Vec<T>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    csv_reader
        .deserialize()
        .map(|record| record.with_context(|| format!("💀 malformed record in '{label}'")))
        .collect()
}
