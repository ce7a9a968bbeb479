//! 🎬 *[a queue fills with batches. somewhere, a connection pool holds its breath.]*
//! *[the clock on the wall reads 2:47am.]*
//!
//! 📥 The TelemetryWorker: pulls one batch, writes it in one transaction,
//! reports how it went, pulls the next. A failed batch is news, not a crash:
//! the worker reports it and goes back to the queue.
//!
//! 🦆 (the duck has no comment at this time)

use anyhow::{Context, Result};
use async_channel::{Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, warn};

use super::Worker;
use crate::backends::{Store, StoreBackend};
use crate::common::TelemetryBatch;

/// 📬 One batch's verdict, sent back to the collector.
#[derive(Debug)]
pub(crate) struct BatchOutcome {
    pub batch_number: usize,
    pub total_batches: usize,
    /// ✅ rows written, or 💀 why not.
    pub result: Result<u64>,
}

#[derive(Debug)]
pub(crate) struct TelemetryWorker {
    id: usize,
    rx: Receiver<TelemetryBatch>,
    results: Sender<BatchOutcome>,
    store: StoreBackend,
}

impl TelemetryWorker {
    pub(crate) fn new(
        id: usize,
        rx: Receiver<TelemetryBatch>,
        results: Sender<BatchOutcome>,
        store: StoreBackend,
    ) -> Self {
        Self {
            id,
            rx,
            results,
            store,
        }
    }
}

impl Worker for TelemetryWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        // -- 🏷️ keep the trip span on every line this worker logs
        let span = Span::current();
        tokio::spawn(
            async move {
                debug!(worker = self.id, "🧵 telemetry worker reporting for duty");
                while let Ok(batch) = self.rx.recv().await {
                    let label = batch.label();
                    let result = self.store.insert_telemetry_batch(&batch).await;
                    match &result {
                        Ok(records) => {
                            debug!(worker = self.id, batch = %label, records, "✅ batch committed")
                        }
                        Err(err) => warn!(
                            worker = self.id,
                            batch = %label,
                            error = %format!("{err:#}"),
                            "💀 batch rolled back"
                        ),
                    }

                    let outcome = BatchOutcome {
                        batch_number: batch.batch_number,
                        total_batches: batch.total_batches,
                        result,
                    };
                    self.results.send(outcome).await.with_context(|| {
                        format!("💀 the collector hung up before batch {label} could report")
                    })?;
                }
                debug!(worker = self.id, "🏁 queue drained and closed; clocking out");
                Ok(())
            }
            .instrument(span),
        )
    }
}
