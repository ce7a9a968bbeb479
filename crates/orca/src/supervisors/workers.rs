//! 🧵 Workers: the unsung heroes who actually write the rows while the
//! Supervisor takes all the credit in the sprint retro.
//!
//! 🚀 This module is like a depot floor, except instead of high-vis vests
//! we wear `#[derive(Debug)]`. 🦆
//!
//! ⚠️ "If you're reading this, the code review went poorly."

use anyhow::Result;
use tokio::task::JoinHandle;

mod telemetry_worker;
pub(crate) use telemetry_worker::{BatchOutcome, TelemetryWorker};

/// 🏗️ A background worker, that does work. duh.
///
/// "What's the DEAL with lifetime annotations? You borrow something,
///  you give it back. It's not that hard, Jerry!" (Seinfeld, on Rust)
pub(crate) trait Worker {
    /// 🚀 Start the worker. Returns a JoinHandle because we trust
    /// but verify. Mostly verify.
    fn start(self) -> JoinHandle<Result<()>>;
}
