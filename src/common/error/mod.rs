//! Unified error types for cellcsv.

pub mod types;

pub use types::{Error, Result};
