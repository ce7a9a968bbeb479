// ai
//! 🎬 *[two stores walk into a struct. both need a connection budget.]*
//! *["We belong together," they said. "In the backends module." The module system nodded.]*
//!
//! 📦 **Common Store Config**: the pool knobs every store embeds.
//!
//! 🧠 Knowledge graph:
//! - `PoolConfig`: flattened into `PostgresStoreConfig` and `InMemoryStoreConfig`.
//!   Postgres hands it to `PgPoolOptions`; the in-memory store turns
//!   `max_connections` into a semaphore so tests see the same budget.
//! - Defaults match the numbers the loader has always run with: 15 connections
//!   (10 workers plus headroom for trip registration), 5 kept warm, 30 minute
//!   idle cutoff, one hour max lifetime.
//! - Lives here (not in `app_config`) to avoid `app_config` → `backends` →
//!   `app_config` circles. The module system has opinions. 🦆

use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;

/// 🏊 Connection pool budget and hygiene, shared by every store.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PoolConfig {
    /// 🔒 Hard ceiling on open sessions. Workers queue up behind it.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 🔥 Sessions kept warm between trips. Unset means 5, or `max_connections`
    /// when the pool is smaller than that.
    #[serde(default)]
    pub min_connections: Option<u32>,
    /// ⏳ How long a worker waits for a free session before its batch fails.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// 💤 Idle sessions older than this get closed.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// ♻️ Every session is recycled after this long, busy or not.
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
}

fn default_max_connections() -> u32 {
    15
}

const DEFAULT_MIN_CONNECTIONS: u32 = 5;

// -- ⏳ 30s: if the pool can't hand out a session in 30s, something upstream is on fire
fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    30 * 60
}

fn default_max_lifetime_secs() -> u64 {
    60 * 60
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: None,
            acquire_timeout_secs: default_acquire_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            max_lifetime_secs: default_max_lifetime_secs(),
        }
    }
}

impl PoolConfig {
    /// 🔥 The warm floor actually handed to the pool.
    pub fn min_connections(&self) -> u32 {
        self.min_connections
            .unwrap_or(DEFAULT_MIN_CONNECTIONS.min(self.max_connections))
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    /// ✅ A pool with zero connections is a very calm pool that loads nothing.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_connections > 0,
            "💀 pool.max_connections must be at least 1; a pool of zero is just a puddle"
        );
        if let Some(min_connections) = self.min_connections {
            ensure!(
                min_connections <= self.max_connections,
                "💀 pool.min_connections ({}) cannot exceed pool.max_connections ({})",
                min_connections,
                self.max_connections
            );
        }
        ensure!(
            self.acquire_timeout_secs > 0,
            "💀 pool.acquire_timeout_secs must be positive, or every acquire times out instantly"
        );
        Ok(())
    }
}
