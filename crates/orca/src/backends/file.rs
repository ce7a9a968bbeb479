// ai
//! 📂 Previously, on "Things That Could Go Wrong With A File"...
//!
//! The data directory was quiet. Too quiet. One `metaData.csv`, a few thousand
//! trip files, and a logger somewhere that had decided `1.0` was a boolean.
//!
//! This module reads a ZTBus-style data directory:
//!
//! ```text
//! <data_dir>/metaData.csv          one row per trip
//! <data_dir>/<trip name>.csv       one row per second of that trip
//! <data_dir>/<trip name>.csv.gz    same thing, squeezed
//! ```
//!
//! 💀 Missing directory → error at open, before anything touches the database.
//! 🦆 (mandatory, no notes)

mod csv_dir_source;

pub(crate) use csv_dir_source::CsvDirSource;
