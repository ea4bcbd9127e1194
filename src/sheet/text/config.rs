//! Configuration for parsing and writing delimited text files

use serde::{Deserialize, Serialize};

/// Default batch read size for [`ChunkParser`](super::parser::ChunkParser) loads.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default read-ahead buffer of a [`CellStream`](super::stream::CellStream).
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 16 * 1024;

/// Configuration for parsing and writing delimited text files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Field separator byte
    pub separator: u8,
    /// Bytes read per chunk when loading a whole file
    pub chunk_size: usize,
    /// Read-ahead buffer size for cell streaming
    pub stream_buffer_size: usize,
    /// Flush written data to disk before a save returns
    pub sync_all: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            separator: b',',
            chunk_size: DEFAULT_CHUNK_SIZE,
            stream_buffer_size: DEFAULT_STREAM_BUFFER_SIZE,
            sync_all: true,
        }
    }
}

impl TextConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field separator
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Set the batch chunk size (clamped to at least one byte)
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Set the streaming buffer size (clamped to at least one byte)
    pub fn with_stream_buffer_size(mut self, size: usize) -> Self {
        self.stream_buffer_size = size.max(1);
        self
    }

    /// Enable/disable flushing to disk on save
    pub fn with_sync_all(mut self, sync_all: bool) -> Self {
        self.sync_all = sync_all;
        self
    }

    /// Comma-separated configuration
    pub fn csv() -> Self {
        Self::new()
    }

    /// Create TSV (tab-separated) configuration
    pub fn tsv() -> Self {
        Self::new().with_separator(b'\t')
    }

    /// Semicolon-separated configuration
    pub fn semicolon() -> Self {
        Self::new().with_separator(b';')
    }

    /// Create pipe-separated configuration
    pub fn pipe() -> Self {
        Self::new().with_separator(b'|')
    }

    pub(crate) fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    pub(crate) fn effective_stream_buffer_size(&self) -> usize {
        self.stream_buffer_size.max(1)
    }
}
