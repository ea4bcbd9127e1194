//! cellcsv - sparse, "A1"-addressed cell access to delimited text files
//!
//! A delimited text file is loaded into a sparse cell store keyed by
//! spreadsheet-style coordinates. Cells can be read, updated and searched by
//! value, and the whole grid can be written back directly or through an
//! atomic write-then-rename. Large files can also be walked one cell at a
//! time without loading them.
//!
//! # Features
//!
//! - **Chunked parser**: state survives chunk boundaries, so input of any size
//!   is parsed in fixed-size reads
//! - **Reverse search**: every stored value maps back to the keys holding it
//! - **Streaming reader**: independent cursor with its own read-ahead buffer
//! - **Atomic saves**: the destination is either fully old or fully new
//!
//! # Example
//!
//! ```no_run
//! use cellcsv::CsvDocument;
//!
//! # fn main() -> Result<(), cellcsv::Error> {
//! let mut doc = CsvDocument::open("people.csv")?;
//! doc.load()?;
//!
//! doc.set_value("A1", "Name")?;
//! assert_eq!(doc.value("A1"), "Name");
//! println!("cells holding 'Tokyo': {:?}", doc.search("Tokyo"));
//!
//! doc.atomic_save()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! Diagnostics are emitted through [`tracing`]; install a subscriber in the
//! host application to see them. Nothing is printed otherwise.

/// Shared error and result types
pub mod common;

/// Cell coordinates, the sparse store, and delimited text I/O
pub mod sheet;

pub use common::{Error, Result};
pub use sheet::text::{CellStream, ChunkParser, CsvDocument, ParseSummary, TextConfig};
pub use sheet::{CellStore, cell_key, parse_key};
