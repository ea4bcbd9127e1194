//! Pull-based cell reader over a buffered input

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use tracing::{trace, warn};

use super::config::{DEFAULT_STREAM_BUFFER_SIZE, TextConfig};
use super::grammar::{Boundary, Grammar, ParseState};
use crate::common::Result;
use crate::sheet::coordinate::cell_key;

/// Reads one cell per call without loading the whole input.
///
/// Unlike the batch parser, empty cells are returned too, so every call maps
/// to exactly one position in the grid. A stream has its own cursor and never
/// looks at, or updates, a [`CellStore`](crate::sheet::CellStore).
///
/// Positions keep counting past `u32::MAX`; cells out there are still
/// returned, but have no [`key`](Self::key).
#[derive(Debug)]
pub struct CellStream<R> {
    reader: R,
    separator: u8,
    grammar: Grammar,
    buffer: Vec<u8>,
    buffer_pos: usize,
    buffer_len: usize,
    row: u64,
    col: u64,
    last: Option<(u64, u64)>,
    at_end: bool,
}

impl<R: Read> CellStream<R> {
    /// Create a stream with the default 16 KiB read-ahead buffer.
    pub fn new(reader: R, separator: u8) -> Self {
        Self::with_buffer_size(reader, separator, DEFAULT_STREAM_BUFFER_SIZE)
    }

    /// Create a stream using the separator and buffer size of `config`.
    pub fn with_config(reader: R, config: &TextConfig) -> Self {
        Self::with_buffer_size(reader, config.separator, config.effective_stream_buffer_size())
    }

    pub fn with_buffer_size(reader: R, separator: u8, buffer_size: usize) -> Self {
        CellStream {
            reader,
            separator,
            grammar: Grammar::new(separator),
            buffer: vec![0; buffer_size.max(1)],
            buffer_pos: 0,
            buffer_len: 0,
            row: 0,
            col: 0,
            last: None,
            at_end: false,
        }
    }

    /// Return the next cell's text, or `None` once the input is exhausted.
    ///
    /// A trailing cell without a line terminator is still returned; the
    /// end-of-stream `None` comes on the call after it.
    pub fn next_cell(&mut self) -> Result<Option<String>> {
        if self.at_end {
            return Ok(None);
        }

        loop {
            if self.buffer_pos >= self.buffer_len && !self.fill_buffer()? {
                return Ok(self.flush_at_eof());
            }

            let byte = self.buffer[self.buffer_pos];
            self.buffer_pos += 1;

            match self.grammar.feed(byte) {
                Boundary::None => {},
                Boundary::Cell => return Ok(Some(self.emit(false))),
                Boundary::Row => return Ok(Some(self.emit(true))),
            }
        }
    }

    /// 0-based `(row, col)` of the cell most recently returned.
    pub fn position(&self) -> Option<(u64, u64)> {
        self.last
    }

    /// Key of the cell most recently returned, e.g. "B3".
    ///
    /// `None` before the first cell, or when the cell lies outside the grid
    /// a key can address.
    pub fn key(&self) -> Option<String> {
        let (row, col) = self.last?;
        Some(cell_key(u32::try_from(row).ok()?, u32::try_from(col).ok()?))
    }

    /// 0-based `(row, col)` the next call will return.
    pub fn cursor(&self) -> (u64, u64) {
        (self.row, self.col)
    }

    pub fn is_at_end(&self) -> bool {
        self.at_end
    }

    pub fn separator(&self) -> u8 {
        self.separator
    }

    /// Unwrap the underlying reader, discarding buffered input.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn fill_buffer(&mut self) -> Result<bool> {
        loop {
            match self.reader.read(&mut self.buffer) {
                Ok(n) => {
                    self.buffer_pos = 0;
                    self.buffer_len = n;
                    return Ok(n > 0);
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn emit(&mut self, end_row: bool) -> String {
        let value = self.grammar.take_cell();
        self.last = Some((self.row, self.col));
        if end_row {
            self.row += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        value
    }

    fn flush_at_eof(&mut self) -> Option<String> {
        self.at_end = true;

        let state = self.grammar.state();
        if state == ParseState::InQuotes {
            warn!(row = self.row + 1, "stream ended inside a quoted field");
        }

        if self.grammar.has_pending_cell() || state != ParseState::Normal {
            Some(self.emit(true))
        } else {
            None
        }
    }

    fn reinit(&mut self) {
        self.grammar = Grammar::new(self.separator);
        self.buffer_pos = 0;
        self.buffer_len = 0;
        self.row = 0;
        self.col = 0;
        self.last = None;
        self.at_end = false;
    }
}

impl<R: Read + Seek> CellStream<R> {
    /// Rewind to the start of the input and forget all parse state.
    pub fn reset(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.reinit();
        trace!("cell stream reset");
        Ok(())
    }

    /// Position the stream so the next call returns the cell at `(row, col)`.
    ///
    /// Rewinds first when the target lies behind the cursor. Returns `false`
    /// when the input ends, or the target row is too short, before the cursor
    /// reaches the target. A `true` result can still be followed by `None`
    /// when the input ends exactly at the target.
    pub fn seek_to(&mut self, row: u32, col: u32) -> Result<bool> {
        let target = (u64::from(row), u64::from(col));
        if self.cursor() > target || self.at_end {
            self.reset()?;
        }

        while self.cursor() < target {
            if self.next_cell()?.is_none() {
                return Ok(false);
            }
        }

        Ok(self.cursor() == target)
    }
}

impl<R: Read> Iterator for CellStream<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_cell() {
            Ok(cell) => cell.map(Ok),
            Err(e) => {
                self.at_end = true;
                Some(Err(e))
            },
        }
    }
}
