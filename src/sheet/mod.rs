//! Sparse spreadsheet-style cell storage.
//!
//! Cells are addressed by "A1"-style keys: column letters followed by a
//! 1-based row number. Only non-empty cells are stored.
//!
//! - [`coordinate`] converts between keys and 0-based `(row, col)` pairs.
//! - [`store`] holds the cells and their reverse (value -> keys) index.
//! - [`text`] reads and writes delimited text files.

pub mod coordinate;
pub mod store;
pub mod text;

pub use coordinate::{canonical_key, cell_key, column_index, column_name, parse_key};
pub use store::CellStore;
pub use text::{CellStream, CsvDocument, TextConfig};
