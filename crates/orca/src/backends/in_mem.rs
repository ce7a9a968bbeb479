//! # Previously, on Orca...
//!
//! 🎬 The buses were parked. The CSVs were parsed. The database was... not
//! invited. Someone had to pretend to be Postgres so the tests could sleep at
//! night. Someone had to keep every row in a `Vec` and count connections like
//! a nervous bouncer.
//!
//! That someone was this module.
//!
//! `in_mem` provides an [`InMemoryStore`] that honours the same contract as the
//! Postgres store: insert-or-get references, unique trip names, per-batch
//! all-or-nothing inserts, a connection budget enforced by a semaphore, and a
//! partition maintenance call that actually computes partitions. Selecting it
//! in config gives a dry run: everything parses, batches, and "commits" to RAM.
//!
//! The [`InMemorySource`] is test-only. It hands out whatever trips the test
//! stuffed into it.
//!
//! 🦆
//!
//! ⚠️ This is NOT for production. Production has a database. Allegedly.

mod in_mem_source;
mod in_mem_store;

#[cfg(test)]
pub(crate) use in_mem_source::InMemorySource;
pub use in_mem_store::InMemoryStoreConfig;
pub(crate) use in_mem_store::InMemoryStore;
