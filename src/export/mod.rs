//! Spreadsheet export encoder.

mod xlsx;

pub use xlsx::{encode, export_filename, ExportError};
