//! Delimited text (CSV, TSV, ...) support.
//!
//! This module loads a delimited text file into a sparse [`CellStore`], keyed
//! by "A1"-style coordinates, and writes it back out.
//!
//! # Features
//!
//! - **Configurable separator**: comma, tab, semicolon, pipe or any other byte
//! - **Chunked loading**: files of any size are parsed in fixed-size chunks
//! - **Streaming reads**: pull one cell at a time without loading the file
//! - **Quote handling**: doubled-quote escapes; unbalanced quotes are tolerated
//! - **Atomic saves**: write-then-rename so a crash never leaves a torn file
//!
//! # Example
//!
//! ```rust,no_run
//! use cellcsv::sheet::text::{CsvDocument, TextConfig};
//!
//! let mut doc = CsvDocument::open_with_config("data.csv", TextConfig::csv())?;
//! doc.load()?;
//!
//! println!("B2 = {}", doc.value("B2"));
//! doc.set_value("C3", "updated")?;
//! for key in doc.search("London") {
//!     println!("found at {key}");
//! }
//! doc.atomic_save()?;
//!
//! // Walk the file on disk one cell at a time
//! doc.reset_stream()?;
//! while let Some(cell) = doc.next_cell()? {
//!     println!("{:?} = {cell}", doc.stream_key());
//! }
//! # Ok::<(), cellcsv::Error>(())
//! ```
//!
//! [`CellStore`]: crate::sheet::CellStore

pub mod config;
pub mod document;
mod grammar;
pub mod parser;
pub mod stream;
pub mod writer;

pub use config::TextConfig;
pub use document::CsvDocument;
pub use grammar::ParseState;
pub use parser::{ChunkParser, ParseSummary, parse_bytes, parse_reader};
pub use stream::CellStream;
