// ai
//! 🐘 *[the elephant never forgets. that's the problem when you load the same trip twice.]*
//!
//! 📦 The Postgres store: sqlx pool, embedded migrations, and `COPY ... FROM STDIN`
//! for the heavy lifting.
//!
//! 🧠 Knowledge graph:
//! - One `PgPool` shared by every worker. Its `max_connections` is THE concurrency cap.
//! - References: `INSERT ... ON CONFLICT DO UPDATE ... RETURNING id` so an
//!   existing key still hands back its id in one round trip.
//! - Trips: own short transaction, `existing_trip` policy applied under a row lock.
//! - Telemetry: acquire → begin → read trip's route → COPY → commit. Drop without
//!   commit rolls back, so every `?` in between is a rollback.
//! - Maintenance: `CALL make_partitions()` in autocommit.
//!
//! 🦆 The duck does not have a database login. We checked.

mod postgres_store;

pub use postgres_store::PostgresStoreConfig;
pub(crate) use postgres_store::PostgresStore;
