//! Measurement export module
//!
//! Acquisition results leave the controller as flat delimited files. The
//! controller itself never writes anything; callers hand a result to
//! [`CsvExporter`] once they want it on disk.

pub mod export;

pub use export::{write_csv, CsvExporter, FREQUENCY_HEADER};
