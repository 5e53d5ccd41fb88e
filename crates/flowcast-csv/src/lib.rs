//! # flowcast-csv
//!
//! CSV input and export for flowcast models.
//!
//! Inputs are read one reference per row (`key, v0, v1, ...`) into a
//! [`ReferenceMap`](flowcast_core::ReferenceMap). Export plans and result
//! series are written one calculation per row.

mod error;
mod options;
mod reader;
mod writer;

pub use error::{CsvError, CsvResult};
pub use options::{CsvReadOptions, CsvWriteOptions, LineTerminator};
pub use reader::CsvReader;
pub use writer::CsvWriter;
